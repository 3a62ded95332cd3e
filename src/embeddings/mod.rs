// Embedding providers: text in, fixed-dimension vectors out.
//
// The analysis core never loads a model itself. Callers construct a
// provider (local ONNX or the OpenAI API) and pass it to the passes that
// need fresh embeddings.

pub mod download;
pub mod onnx;
pub mod openai;
pub mod traits;

pub use traits::{clean_text, EmbeddingProvider};
