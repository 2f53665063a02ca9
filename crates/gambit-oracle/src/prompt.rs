use serde::Serialize;

pub const SYSTEM_PROMPT: &str =
    "You are a chess engine that provides the best move in UCI format given a list of previous moves.";

/// Build the user prompt for the current position.
///
/// `feedback` is the rendered rejection notice from the previous attempt, if any.
pub fn build_user_prompt(moves: &[String], feedback: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are a chess engine. The current game has the following moves in UCI format: ",
    );
    if moves.is_empty() {
        prompt.push_str("(empty, it's the first move of the game).");
    } else {
        prompt.push_str(&moves.join(" "));
        prompt.push('.');
    }
    prompt.push_str("\nWhat is the best next move in UCI format for the current player?");
    if let Some(feedback) = feedback.filter(|f| !f.is_empty()) {
        prompt.push_str("\nIMPORTANT: ");
        prompt.push_str(feedback);
    }
    prompt.push_str(
        "\nOnly respond with the single best move in UCI notation \
         (e.g., 'a1b1' or 'e7e8q' for promotion). Do not add any explanation or any other text.",
    );
    prompt
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl<'a> ChatRequest<'a> {
    pub fn new(model: &'a str, user_prompt: &'a str, temperature: f32) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
            max_tokens: None,
        }
    }
}
