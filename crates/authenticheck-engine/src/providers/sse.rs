use std::io::BufRead;

use authenticheck_contracts::StreamError;
use serde_json::Value;

use super::gemini::candidate_text;

/// Reads a `text/event-stream` body and yields the candidate text of each
/// event, in arrival order. Events without text are skipped. The first
/// error ends the stream.
pub struct SseTextStream<R> {
    reader: R,
    line: String,
    done: bool,
}

impl<R: BufRead> SseTextStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            done: false,
        }
    }

    /// Collects `data:` lines up to the next blank line.
    fn read_event(&mut self) -> Result<Option<String>, StreamError> {
        let mut data: Vec<String> = Vec::new();
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|err| StreamError(format!("stream read failed: {err}")))?;
            if read == 0 {
                return Ok(if data.is_empty() {
                    None
                } else {
                    Some(data.join("\n"))
                });
            }
            let line = self.line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if data.is_empty() {
                    continue;
                }
                return Ok(Some(data.join("\n")));
            }
            if let Some(payload) = line.strip_prefix("data:") {
                data.push(payload.strip_prefix(' ').unwrap_or(payload).to_string());
            }
        }
    }
}

impl<R: BufRead> Iterator for SseTextStream<R> {
    type Item = Result<String, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let data = match self.read_event() {
                Ok(Some(data)) => data,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            if data.trim() == "[DONE]" {
                self.done = true;
                return None;
            }
            match parse_event(&data) {
                Ok(Some(text)) => return Some(Ok(text)),
                Ok(None) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

fn parse_event(data: &str) -> Result<Option<String>, StreamError> {
    let payload: Value = serde_json::from_str(data)
        .map_err(|err| StreamError(format!("invalid stream chunk ({err})")))?;
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(StreamError(message));
    }
    let text = candidate_text(&payload);
    Ok((!text.is_empty()).then_some(text))
}
