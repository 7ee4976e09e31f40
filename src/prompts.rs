//! Prompt templates as immutable values.
//!
//! A [`PromptSpec`] bundles everything the reduce stage needs to produce
//! one artifact: a name, the instruction template, the variable the input
//! text binds to, and the model tier the call should run at. The template
//! text itself is data — callers are free to supply their own; the
//! constructors below cover the artifacts the system ships with.

use crate::completion::ModelTier;

/// An instruction template bound to a model tier.
///
/// `template` is the system-instruction text. It may reference the input
/// through `{input_variable}` (substituted by [`render`](Self::render));
/// templates without the placeholder describe input that is delivered
/// separately, enclosed in triple quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub name: String,
    pub template: String,
    pub input_variable: String,
    pub tier: ModelTier,
}

impl PromptSpec {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        input_variable: impl Into<String>,
        tier: ModelTier,
    ) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            input_variable: input_variable.into(),
            tier,
        }
    }

    /// Render the template against concrete input: the `{input_variable}`
    /// placeholder is substituted when present, otherwise the input is
    /// appended in triple quotes.
    #[must_use]
    pub fn render(&self, input: &str) -> String {
        let placeholder = format!("{{{}}}", self.input_variable);
        if self.template.contains(&placeholder) {
            self.template.replace(&placeholder, input)
        } else {
            format!("{}\n\n'''{input}'''", self.template)
        }
    }
}

/// Instructions for summarizing a single section (the map stage).
#[must_use]
pub fn section_summary(media_type: &str, tier: ModelTier) -> PromptSpec {
    PromptSpec::new(
        "section_summary",
        format!(
            "You will be given a single section from a {media_type}, enclosed in triple \
             quotes. Provide a cohesive summary of the excerpt, focusing on the key \
             points and main ideas, while maintaining clarity and conciseness."
        ),
        "text",
        tier,
    )
}

/// The default final artifact: an HTML synopsis with key takeaways.
///
/// Worded to accept either section summaries (clustered path) or the
/// complete text (single-call path), so one template serves both.
#[must_use]
pub fn synopsis(media_type: &str, tier: ModelTier) -> PromptSpec {
    PromptSpec::new(
        "synopsis",
        format!(
            "You will be given content from a {media_type} (either its complete text \
             or a list of section summaries), enclosed in triple quotes. Determine \
             what the {media_type} is about overall and summarize it with that in \
             mind. Synthesize the information into a well-formatted, easy-to-read \
             synopsis, structured like an essay. Do not simply reword the provided \
             text, and do not copy its structure. Avoid repetition and connect the \
             ideas together. Precede the synopsis with a short bullet list of key \
             takeaways, and close with a conclusion that ties the ideas together. \
             Format the result in HTML, divided into paragraphs, for maximum \
             readability."
        ),
        "text",
        tier,
    )
}

/// Clinical progress note suitable for an EMR entry.
#[must_use]
pub fn progress_note(tier: ModelTier) -> PromptSpec {
    PromptSpec::new(
        "progress_note",
        "You will be given summarized progress notes from a therapy session, enclosed \
         in triple quotes. Determine what the overall note is about and produce a \
         single concise progress note from it, structured the way a typical therapy \
         progress note is. Do not simply reword the provided text. Precede the note \
         with a short bullet list of key takeaways. Format the result in HTML, \
         divided into paragraphs.",
        "text",
        tier,
    )
}

/// Short, friendly post-visit email for the patient.
#[must_use]
pub fn post_visit_email(tier: ModelTier) -> PromptSpec {
    PromptSpec::new(
        "post_visit_email",
        "You will be given summarized progress notes from a therapy session, enclosed \
         in triple quotes. Write a post-visit email to the patient, including action \
         items when they make sense. Target fewer than 100 words, use friendly \
         language at a fifth-grade reading level, and avoid repeating the provided \
         text. Format the result in HTML.",
        "text",
        tier,
    )
}

/// Superbill the patient can submit for insurance claims.
#[must_use]
pub fn superbill(tier: ModelTier) -> PromptSpec {
    PromptSpec::new(
        "superbill",
        "You will be given summarized progress notes from a therapy session, enclosed \
         in triple quotes. Produce a professional superbill the patient can submit \
         for insurance claim purposes, structured the way a typical therapy \
         superbill is. Do not simply reword the provided text.",
        "text",
        tier,
    )
}

/// Reimbursement claims email to the insurance company.
#[must_use]
pub fn claims_email(tier: ModelTier) -> PromptSpec {
    PromptSpec::new(
        "claims_email",
        "You will be given summarized progress notes from a therapy session, enclosed \
         in triple quotes. Write a professional claims email from the clinician to \
         the patient's insurance company requesting reimbursement for the session, \
         structured the way a typical claims email is. Do not simply reword the \
         provided text.",
        "text",
        tier,
    )
}
