use std::fmt::Arguments;

use slog::{Drain, Key, OwnedKVList, Record, KV};
use slog_term::{Decorator, RecordDecorator};

pub struct ConsoleDrain {
    decorator: slog_term::TermDecorator,
}

impl ConsoleDrain {
    pub fn new() -> Self {
        ConsoleDrain {
            decorator: slog_term::TermDecorator::new().build(),
        }
    }

    pub fn target(&self) -> super::Target {
        super::Target {
            name: "console".to_owned(),
            endpoint: None,
        }
    }
}

impl Default for ConsoleDrain {
    fn default() -> Self {
        Self::new()
    }
}

impl Drain for ConsoleDrain {
    type Ok = ();
    type Err = std::io::Error;

    fn log(&self, record: &Record, values: &OwnedKVList) -> std::io::Result<()> {
        self.decorator.with_record(record, values, |decorator| {
            let mut serializer = ConsoleSerializer { decorator };

            record.kv().serialize(record, &mut serializer)?;
            values.serialize(record, &mut serializer)?;

            decorator.start_whitespace()?;
            writeln!(decorator)?;
            decorator.flush()?;
            Ok(())
        })
    }
}

struct ConsoleSerializer<'a> {
    decorator: &'a mut dyn RecordDecorator,
}

impl<'a> slog::Serializer for ConsoleSerializer<'a> {
    fn emit_arguments(&mut self, _key: Key, _val: &Arguments) -> slog::Result {
        // Deny any value, excluding `SerdeValue`.
        Err(slog::Error::Other)
    }

    fn emit_serde(&mut self, _key: Key, value: &dyn slog::SerdeValue) -> slog::Result {
        let entry = value
            .as_any()
            .downcast_ref::<super::entry::Entry>()
            .unwrap();

        self.decorator.start_whitespace()?;

        if *super::JSON_FLAG {
            write!(
                self.decorator,
                "{}",
                serde_json::to_string(entry).map_err(|e| std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("serde serialization error: {}", e),
                ))?
            )?;
            return Ok(());
        }

        write!(self.decorator, "[{}]", entry.backend)?;
        if !entry.key.is_empty() {
            write!(self.decorator, " key={}", entry.key)?;
        }
        if !entry.owner.is_empty() {
            write!(self.decorator, " owner={}", entry.owner)?;
        }

        write!(self.decorator, "\nTime: ")?;
        self.decorator.start_timestamp()?;
        slog_term::timestamp_local(self.decorator)?;

        self.decorator.start_whitespace()?;

        if !entry.deployment_id.is_empty() {
            write!(self.decorator, "\nDeploymentID: {}", entry.deployment_id)?;
        }

        self.decorator.start_msg()?;
        if let Some(trace) = &entry.error {
            write!(self.decorator, "\nError: {}", trace.message)?;
            for (i, source) in trace.source.iter().enumerate() {
                write!(
                    self.decorator,
                    "\n{:>8}: {}",
                    trace.source.len() - i,
                    source
                )?;
            }
        } else if !entry.message.is_empty() {
            write!(self.decorator, "\n{}", entry.message)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::entry::{Entry, ErrKind};

    #[tokio::test]
    async fn test_logger_console() {
        let drain = ConsoleDrain::new().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        let log = slog::Logger::root(drain, slog::slog_o!());

        let entry = Entry {
            deployment_id: "deployment_id".to_string(),
            level: "error".to_string(),
            kind: ErrKind::System,
            time: "time".to_string(),
            backend: "redis".to_string(),
            key: "my-lock".to_string(),
            owner: "owner-token".to_string(),
            message: "".to_string(),
            error: None,
        };
        slog::info!(log, ""; entry);
    }
}
