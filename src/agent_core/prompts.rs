//! System prompt for document chat sessions.

use super::tool_router::ANALYZE_TOOL_NAME;
use super::types::Document;

/// Instructions given to the model ahead of the document text.
pub fn instructions() -> String {
    format!(
        "You are an assistant that helps users analyze documents. The user has uploaded one or more \
         documents. Use the available tools to answer the user's questions.\n\
         Strategy:\n\
         1. When the user asks a question about the document (e.g., 'spot non-standard terms', \
         'summarize the risks'), call the `{ANALYZE_TOOL_NAME}` tool.\n\
         2. Use the output of the tool to formulate your answer. The tool provides a pre-analyzed \
         summary of potentially problematic clauses.\n\
         3. The user's documents are concatenated and separated by `--- filename ---`. When you find \
         relevant information, mention the filename.\n\
         4. Do not ask the user to provide the text from the document.\n\
         All replies should be in English regardless of document text.\n\
         The user is aware you are not a lawyer and knows you're just an AI assistant."
    )
}

/// Full system prompt: instructions followed by the document, verbatim.
pub fn system_prompt(document: &Document) -> String {
    format!(
        "{}\n\nDocument text:\n{}",
        instructions(),
        document.as_str()
    )
}
