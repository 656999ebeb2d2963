use anyhow::Result;
#[cfg(not(feature = "with-serde"))]
use anyhow::bail;
use direct_mta::{Fields, Level, SendResult};

use crate::args::Format;

/// Tracks the worst level seen while results are printed.
pub struct Reporter {
    format: Format,
    verbose: bool,
    worst: Option<Level>,
}

impl Reporter {
    pub fn new(format: Format, verbose: bool) -> Result<Self> {
        #[cfg(not(feature = "with-serde"))]
        if format == Format::Ndjson {
            bail!("--format ndjson requires the 'with-serde' feature");
        }
        Ok(Self {
            format,
            verbose,
            worst: None,
        })
    }

    pub fn report(&mut self, result: &SendResult) -> Result<()> {
        self.worst = Some(match self.worst {
            Some(worst) => worst.min(result.level),
            None => result.level,
        });
        match self.format {
            Format::Human => self.log(result),
            Format::Ndjson => {
                #[cfg(feature = "with-serde")]
                println!("{}", serde_json::to_string(result)?);
            }
        }
        Ok(())
    }

    fn log(&self, result: &SendResult) {
        let line = self.line(result);
        match result.level {
            Level::Fatal | Level::Error => tracing::error!("{line}"),
            Level::Warn => tracing::warn!("{line}"),
            Level::Info | Level::Debug => tracing::info!("{line}"),
        }
    }

    /// Message, then the error if any, then the fields when verbose.
    fn line(&self, result: &SendResult) -> String {
        let mut line = result.message.clone();
        if let Some(error) = &result.error {
            line.push_str(": ");
            line.push_str(error);
        }
        if self.verbose && !result.fields.is_empty() {
            line.push_str(" [");
            line.push_str(&render_fields(&result.fields));
            line.push(']');
        }
        line
    }

    /// `true` when some result fell below `Warn`.
    pub fn failed(&self) -> bool {
        self.worst.is_some_and(|worst| worst < Level::Warn)
    }
}

fn render_fields(fields: &Fields) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use direct_mta::Outcome;

    fn refused() -> SendResult {
        let mut fields = Fields::new();
        fields.insert("domain".into(), "example.com".into());
        fields.insert("recipient".into(), "a@example.com".into());
        SendResult {
            level: Level::Fatal,
            outcome: Outcome::Rejected,
            message: "a@example.com rejected by mx.example.com:25".into(),
            error: Some("550 no such user".into()),
            fields,
        }
    }

    #[test]
    fn quiet_line_carries_no_fields() {
        let reporter = Reporter::new(Format::Human, false).unwrap();
        assert_eq!(
            reporter.line(&refused()),
            "a@example.com rejected by mx.example.com:25: 550 no such user"
        );
    }

    #[test]
    fn verbose_line_appends_fields() {
        let reporter = Reporter::new(Format::Human, true).unwrap();
        assert_eq!(
            reporter.line(&refused()),
            "a@example.com rejected by mx.example.com:25: 550 no such user \
             [domain=example.com recipient=a@example.com]"
        );
    }

    #[test]
    fn verbose_line_without_fields_has_no_brackets() {
        let reporter = Reporter::new(Format::Human, true).unwrap();
        let mut result = refused();
        result.fields.clear();
        result.error = None;
        assert_eq!(
            reporter.line(&result),
            "a@example.com rejected by mx.example.com:25"
        );
    }

    #[test]
    fn fields_render_in_key_order() {
        let mut fields = Fields::new();
        fields.insert("server".into(), "mx.example.com:25".into());
        fields.insert("domain".into(), "example.com".into());
        assert_eq!(
            render_fields(&fields),
            "domain=example.com server=mx.example.com:25"
        );
    }
}
