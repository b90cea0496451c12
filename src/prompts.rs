//! Prompt templates for slide generation and groundedness validation.
//!
//! Prompts live here, not in the stages, so a wording change touches exactly
//! one file and tests can inspect them without calling an LLM.
//!
//! Two versions exist, selected by [`PromptVariant`]:
//!
//! * `Titled` (default) asks for a slide title and has the validator score it.
//! * `Classic` is the earlier content/dialogue-only pair.
//!
//! Callers can override either system prompt through
//! [`crate::config::StoryboardConfig`]; the user templates are fixed.

use crate::config::PromptVariant;
use crate::output::SlidePayload;

/// Generation system prompt for [`PromptVariant::Classic`].
pub const CLASSIC_GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert instructional designer specialized in creating engaging Massive Open Online Courses (MOOC) content. Your task is to transform educational content into clear, concise slides with accompanying instructor dialogue. Follow these guidelines:

1. SLIDE CONTENT:
   - Keep slide content brief and focused
   - Use clear hierarchy with headers and bullet points
   - Include only key information from the source text
   - Maintain academic tone while being accessible
   - Each slide should focus on one main concept

2. INSTRUCTOR DIALOGUE:
   - Write natural, conversational dialogue
   - Expand on slide content without repeating it verbatim
   - Provide context and explanations
   - Use engaging, teaching-oriented language
   - Keep explanations clear and concise

3. IMPORTANT RULES:
   - Use ONLY information present in the provided content
   - Do not add examples or explanations not found in the source
   - Maintain factual accuracy
   - Keep slides and dialogue self-contained - don't reference other slides
   - Follow proper formatting for slide content (headers, bullets, etc.)"#;

/// Generation system prompt for [`PromptVariant::Titled`].
pub const TITLED_GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert instructional designer specialized in creating engaging Massive Open Online Courses (MOOC) content. Your task is to transform educational content into clear, concise slides with accompanying instructor dialogue. Follow these guidelines:

1. SLIDE TITLE:
   - Write a short title (at most ten words) naming the main concept
   - The title must be supported by the source content
   - Do not repeat the title inside the slide content

2. SLIDE CONTENT:
   - Keep slide content brief and focused
   - Use clear hierarchy with bullet points
   - Include only key information from the source text
   - Maintain academic tone while being accessible
   - Each slide should focus on one main concept

3. INSTRUCTOR DIALOGUE:
   - Write natural, conversational dialogue
   - Expand on slide content without repeating it verbatim
   - Provide context and explanations
   - Use engaging, teaching-oriented language
   - Keep explanations clear and concise

4. IMPORTANT RULES:
   - Use ONLY information present in the provided content
   - Do not add examples or explanations not found in the source
   - Maintain factual accuracy
   - Keep slides and dialogue self-contained - don't reference other slides
   - Use plain text with line breaks; do not use links or images"#;

/// Generation user template. `{text}` is replaced verbatim.
pub const GENERATION_USER_TEMPLATE: &str = r#"Transform the following content into a MOOC slide with accompanying instructor dialogue. Ensure all information comes directly from the source content:

SOURCE CONTENT:
{text}

Generate exactly one slide and its corresponding dialogue that captures the main concept from this content."#;

const SCORING_GUIDELINES: &str = r#"SCORING GUIDELINES:
   10: Perfect alignment, excellent structure, no unsupported content
   8-9: Strong alignment, good structure, minor omissions only
   6-7: Decent alignment, some structural issues or omissions
   4-5: Significant gaps or misalignments
   1-3: Major issues with accuracy or completeness
   0: Completely misaligned or unsupported content

Provide detailed feedback explaining your score and any identified issues."#;

/// Validation system prompt for [`PromptVariant::Titled`].
pub const TITLED_VALIDATION_SYSTEM_PROMPT: &str = r#"You are an expert content validator specialized in analyzing the groundedness of educational materials. Your task is to evaluate how well a generated slide (including title and content) and its instructor dialogue align with the source content. Follow these evaluation criteria:

1. TITLE ACCURACY:
   - Title should accurately reflect the main topic
   - Must be supported by source content
   - Should be clear and appropriately scoped

2. CONTENT ACCURACY:
   - Every statement must be supported by the source
   - Check bullet points for accuracy and completeness
   - Verify all included details and examples
   - Ensure proper organization and hierarchy

3. DIALOGUE ALIGNMENT:
   - Verify that explanations match source content
   - Check for unsupported claims or examples
   - Ensure proper emphasis on key points

4. COMPLETENESS:
   - Key concepts from source should be represented
   - Important context should not be omitted
   - Proper balance of overview and details

5. "#;

/// Validation system prompt for [`PromptVariant::Classic`].
pub const CLASSIC_VALIDATION_SYSTEM_PROMPT: &str = r#"You are an expert content validator specialized in analyzing the groundedness of educational materials. Your task is to evaluate how well a generated slide and its instructor dialogue align with the source content. Follow these evaluation criteria:

1. CONTENT ACCURACY:
   - Every statement must be supported by the source
   - Check bullet points for accuracy and completeness
   - Verify all included details and examples

2. DIALOGUE ALIGNMENT:
   - Verify that explanations match source content
   - Check for unsupported claims or examples
   - Ensure proper emphasis on key points

3. COMPLETENESS:
   - Key concepts from source should be represented
   - Important context should not be omitted

4. "#;

/// Validation user template for [`PromptVariant::Titled`].
pub const TITLED_VALIDATION_USER_TEMPLATE: &str = r#"Evaluate the groundedness of the following slide and instructor dialogue against the source content:

SOURCE CONTENT:
{text}

SLIDE TITLE:
{slide_title}

SLIDE CONTENT:
{slide_content}

INSTRUCTOR DIALOGUE:
{slide_dialogue}

Analyze the groundedness and provide a score and detailed feedback."#;

/// Validation user template for [`PromptVariant::Classic`].
pub const CLASSIC_VALIDATION_USER_TEMPLATE: &str = r#"Evaluate the groundedness of the following slide content and instructor dialogue against the source content:

SOURCE CONTENT:
{text}

SLIDE CONTENT:
{slide_content}

INSTRUCTOR DIALOGUE:
{slide_dialogue}

Analyze the groundedness and provide a score and detailed feedback."#;

/// Default generation system prompt for `variant`.
pub fn generation_system_prompt(variant: PromptVariant) -> &'static str {
    match variant {
        PromptVariant::Classic => CLASSIC_GENERATION_SYSTEM_PROMPT,
        PromptVariant::Titled => TITLED_GENERATION_SYSTEM_PROMPT,
    }
}

/// Default validation system prompt for `variant`, rubric included.
pub fn validation_system_prompt(variant: PromptVariant) -> String {
    let head = match variant {
        PromptVariant::Classic => CLASSIC_VALIDATION_SYSTEM_PROMPT,
        PromptVariant::Titled => TITLED_VALIDATION_SYSTEM_PROMPT,
    };
    format!("{head}{SCORING_GUIDELINES}")
}

/// Build the generation user message.
pub fn generation_user_prompt(text: &str) -> String {
    GENERATION_USER_TEMPLATE.replace("{text}", text)
}

/// Build the validation user message.
///
/// Placeholders are substituted in a single left-to-right pass so that text
/// containing a literal `{slide_content}` is never re-expanded.
pub fn validation_user_prompt(variant: PromptVariant, text: &str, slide: &SlidePayload) -> String {
    let template = match variant {
        PromptVariant::Classic => CLASSIC_VALIDATION_USER_TEMPLATE,
        PromptVariant::Titled => TITLED_VALIDATION_USER_TEMPLATE,
    };
    let title = slide.title.as_deref().unwrap_or("");
    fill(
        template,
        &[
            ("{text}", text),
            ("{slide_title}", title),
            ("{slide_content}", slide.content.as_str()),
            ("{slide_dialogue}", slide.dialogue.as_str()),
        ],
    )
}

fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match vars.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
