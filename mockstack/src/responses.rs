//! Canned completions keyed on what the user asked

/// Reply for the last user message; the system prompt does not change it
pub fn canned_reply(user_message: &str) -> String {
    let lower = user_message.to_lowercase();

    if lower.contains("hello") || lower.contains("who are you") {
        "Hello! I'm a helpful AI assistant created for demonstration purposes. \
         I'm here to help with your questions and tasks."
            .to_string()
    } else if lower.contains("function") && (lower.contains("python") || lower.contains("programming")) {
        "A Python function is a reusable block of code that performs a specific task. \
         Define one with `def greet(name): return f\"Hello, {name}!\"` and call it as `greet(\"Alice\")`. \
         Functions help organize code and avoid repetition."
            .to_string()
    } else if lower.contains("photosynthesis") {
        "Photosynthesis is how plants make food: leaves capture sunlight, roots draw up water, \
         and chlorophyll combines them with carbon dioxide to produce sugar and release oxygen."
            .to_string()
    } else if lower.contains("birthday party") {
        "Plan the date and guest list, pick a theme, send invitations, prepare games and food, \
         decorate on the day, and keep a backup indoor activity ready."
            .to_string()
    } else {
        let preview: String = user_message.chars().take(50).collect();
        format!(
            "Thank you for your question about '{preview}...'. This is a mock response from the \
             demonstration stack. A real deployment would answer with an actual language model."
        )
    }
}

/// Whitespace token count, good enough for usage accounting
pub fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
