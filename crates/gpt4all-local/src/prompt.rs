//! Prompt templating for the chat endpoint.

/// Persona used when a request carries no `system_prompt` field.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Você é um assistente financeiro amigável e prestativo. \
Responda em português do Brasil. \
Ajude o usuário com dúvidas sobre finanças pessoais, \
orçamento, investimentos e economia.";

/// Build the text handed to the model.
///
/// An empty system prompt leaves the user prompt untouched.
pub fn build_prompt(prompt: &str, system_prompt: &str) -> String {
    if system_prompt.is_empty() {
        return prompt.to_string();
    }
    format!("System: {system_prompt}\n\nUser: {prompt}\n\nAssistant:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_role_template() {
        let prompt = build_prompt("Quanto rende a poupança?", "Seja breve.");
        assert_eq!(
            prompt,
            "System: Seja breve.\n\nUser: Quanto rende a poupança?\n\nAssistant:"
        );
    }

    #[test]
    fn test_empty_system_prompt_is_verbatim() {
        assert_eq!(build_prompt("  raw text ", ""), "  raw text ");
    }

    #[test]
    fn test_default_persona() {
        assert!(DEFAULT_SYSTEM_PROMPT.starts_with("Você é um assistente financeiro"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Responda em português do Brasil. Ajude"));
        assert!(DEFAULT_SYSTEM_PROMPT.ends_with("investimentos e economia."));
    }
}
