use crate::routing::RoutingResult;

/// Build the instruction block for the routed device.
pub fn instruction_block(routing: &RoutingResult) -> String {
    format!(
        "You are a Geotab Technical Support Expert specializing in {device}.\n\
        \n\
        STRICT MANDATE:\n\
        - Your output must ALWAYS be in English. No exceptions.\n\
        - If the user asks in Spanish, translate your answer to English.\n\
        - Base your technical answers on the official Geotab standards for {device}.\n\
        - Reference this documentation URL in your response if helpful: {url}",
        device = routing.device_label,
        url = routing.reference_url,
    )
}

/// Compose the text sent to the model: instructions, the labeled question
/// verbatim, then the closing cue.
pub fn compose(question: &str, routing: &RoutingResult) -> String {
    format!(
        "{}\n\nUSER QUESTION: {}\n\nTECHNICAL ANSWER IN ENGLISH:",
        instruction_block(routing),
        question
    )
}
