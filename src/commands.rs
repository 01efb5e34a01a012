use std::collections::HashMap;
use std::future::Future;

use futures_util::future::BoxFuture;
use serde_json::Value;

type Handler = Box<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;
type Gate = Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;
type SendCallback = Box<dyn Fn(&str, Value) + Send + Sync>;

/// Transport-agnostic event dispatcher: maps event names to async handlers,
/// with one optional gate run before every dispatch (e.g. "is the controlled
/// browser connected"). An event with no registered handler is answered with
/// an explicit not-found error event.
pub struct CommandChannel {
    handlers: HashMap<String, Handler>,
    gate: Option<Gate>,
    send_callback: Option<SendCallback>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            gate: None,
            send_callback: None,
        }
    }

    /// Sets the callback used to push events back to the transport layer.
    pub fn on_send_message<F>(&mut self, callback: F)
    where
        F: Fn(&str, Value) + Send + Sync + 'static,
    {
        self.send_callback = Some(Box::new(callback));
    }

    pub fn send_message(&self, event: &str, payload: Value) {
        match &self.send_callback {
            Some(cb) => cb(event, payload),
            None => tracing::warn!(event, "no send callback registered"),
        }
    }

    /// Installs the precondition gate run before every dispatch. A `false`
    /// return suppresses the handler for that event.
    pub fn before_next<F, Fut>(&mut self, gate: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.gate = Some(Box::new(move || Box::pin(gate())));
    }

    pub fn register_handler<F, Fut>(&mut self, event: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers
            .insert(event.into(), Box::new(move |payload| Box::pin(handler(payload))));
    }

    pub async fn handle_event(&self, event: &str, payload: Value) {
        let Some(handler) = self.handlers.get(event) else {
            tracing::warn!(event, "no handler registered for event");
            self.send_message("error", Value::String(format!("{event} was not found")));
            return;
        };

        if let Some(gate) = &self.gate {
            if !gate().await {
                tracing::warn!(event, "dispatch refused by precondition gate");
                return;
            }
        }

        handler(payload).await;
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_registered_handler_receives_payload() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let mut channel = CommandChannel::new();
        channel.register_handler("message-instruction", move |payload| {
            let seen = seen_clone.clone();
            async move {
                *seen.lock().unwrap() = Some(payload);
            }
        });

        channel
            .handle_event("message-instruction", json!({ "message": "hi" }))
            .await;

        assert_eq!(
            seen.lock().unwrap().take().unwrap(),
            json!({ "message": "hi" })
        );
    }

    #[tokio::test]
    async fn test_unknown_event_emits_not_found_error() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();

        let mut channel = CommandChannel::new();
        channel.on_send_message(move |event, payload| {
            errors_clone
                .lock()
                .unwrap()
                .push((event.to_string(), payload));
        });

        channel.handle_event("does-not-exist", json!(null)).await;

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "error");
        assert_eq!(errors[0].1, json!("does-not-exist was not found"));
    }

    #[tokio::test]
    async fn test_gate_refusal_suppresses_handler() {
        let called = Arc::new(AtomicUsize::new(0));
        let called_clone = called.clone();
        let connected = Arc::new(AtomicBool::new(false));
        let connected_clone = connected.clone();

        let mut channel = CommandChannel::new();
        channel.before_next(move || {
            let connected = connected_clone.clone();
            async move { connected.load(Ordering::SeqCst) }
        });
        channel.register_handler("launch", move |_| {
            let called = called_clone.clone();
            async move {
                called.fetch_add(1, Ordering::SeqCst);
            }
        });

        channel.handle_event("launch", json!(null)).await;
        assert_eq!(called.load(Ordering::SeqCst), 0);

        connected.store(true, Ordering::SeqCst);
        channel.handle_event("launch", json!(null)).await;
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }
}
