//! The LLM backend contract (external interface, §6).
//!
//! `LlmBackend` is the one required capability; `StreamingBackend` and
//! `TokenAccounting` are optional capabilities queried once at `Agent`
//! construction rather than probed at runtime via downcasting — the
//! Design Notes call out "runtime reflection on the LLM backend" as a
//! source pattern to replace with explicit, statically-known traits.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::types::{ChatMessage, GenerationOptions};
use crate::error::Result;

/// Required: a single non-streaming chat completion call.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Model identifier this backend answers for, e.g. `"llama3.2:3b"` or
    /// `"claude-opus-4"`. Consulted by the Model-Tier Selector.
    fn model(&self) -> &str;

    /// Human-readable provider name, stamped onto `RunResponse::provider`
    /// on success.
    fn provider_name(&self) -> &str;

    async fn chat(
        &self,
        ctx: CancellationToken,
        messages: &[ChatMessage],
        system_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String>;
}

/// Optional capability: emit partial tokens as they arrive. Queried once
/// via [`as_streaming`](StreamingCapable::as_streaming) at construction.
#[async_trait]
pub trait StreamingBackend: LlmBackend {
    /// Stream a chat completion, invoking `on_token` for each increment of
    /// text. Returns the final assembled text.
    async fn chat_stream(
        &self,
        ctx: CancellationToken,
        messages: &[ChatMessage],
        system_prompt: &str,
        options: &GenerationOptions,
        on_token: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String>;
}

/// Optional capability: a running token counter a backend maintains
/// across calls. Reset at run start, captured unconditionally (including
/// error paths) before the run returns.
pub trait TokenAccounting: Send + Sync {
    fn reset_tokens(&self);
    fn total_tokens(&self) -> u32;
}

/// Queries whether a concrete backend also implements the optional
/// capabilities, so the Agentic Loop decides this once at construction
/// instead of attempting a downcast on every call.
pub trait BackendCapabilities: LlmBackend {
    fn as_streaming(&self) -> Option<&dyn StreamingBackend> {
        None
    }

    fn as_token_accounting(&self) -> Option<&dyn TokenAccounting> {
        None
    }
}
