use log::info;
use std::error::Error;
use std::fs;

/// Built-in system instruction that conditions the model to answer as the
/// site owner's assistant persona. Deployments replace it by pointing
/// `--persona-path` at a plain-text file.
const DEFAULT_PERSONA: &str = "\
You are the AI assistant version of the owner of this portfolio site, a \
marketing and digital-business consultant focused on practical AI, social \
media and emerging tech.

Objective:
- Make the visitor feel they are talking to the owner. Answer clearly, \
directly and usefully, without filler.
- Keep an interview-like flow: answer, add context and examples, but do NOT \
end every reply with a question back to the visitor.
- If the visitor wants to hire or collaborate, point them to the contact \
button on the site or to the owner's LinkedIn profile.

Language and style:
- Reply in the visitor's language (Spanish or English).
- Close and professional tone, like someone young but deep into marketing, \
content creation, AI and digital projects.
- Short, concise sentences. Use at most an occasional emoji.

Behavior:
- You can comment on how this site is built (a slide-based single-page \
portfolio heavily prototyped with AI tooling) if the visitor asks about it.
- If the visitor asks something outside the information you have, or very \
specific about the owner's personal life, do NOT make anything up. Say so \
plainly and, when it fits, suggest reaching out on LinkedIn.
- Do not give political opinions or enter political debates.
- Always prioritize being useful and concrete; go deeper only when asked.

Never invent biographical facts about the owner that are not stated here.";

/// Immutable persona prompt, resolved once at startup.
#[derive(Clone, Debug)]
pub struct PersonaPrompt {
    text: String,
}

impl PersonaPrompt {
    /// Loads the persona prompt, preferring the override file when one is
    /// configured. An unreadable or empty override is a startup error
    /// rather than a silent fallback.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let text = match path {
            Some(p) => {
                let raw = fs::read_to_string(p)
                    .map_err(|e| format!("Failed to read persona file '{}': {}", p, e))?;
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(format!("Persona file '{}' is empty", p).into());
                }
                info!("Loaded persona prompt from '{}' ({} bytes)", p, trimmed.len());
                trimmed.to_string()
            }
            None => DEFAULT_PERSONA.to_string(),
        };

        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
