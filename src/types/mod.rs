mod author;
mod chat_completion_chunk;
mod chat_completion_params;
mod chat_message_param;
mod choice_delta;
mod chunk_choice;

pub use author::Author;
pub use chat_completion_chunk::ChatCompletionChunk;
pub use chat_completion_params::ChatCompletionParams;
pub use chat_message_param::ChatMessageParam;
pub use choice_delta::ChoiceDelta;
pub use chunk_choice::ChunkChoice;
