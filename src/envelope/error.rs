use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("message body is empty")]
    EmptyBody,
    #[error("message has no header block and no recipients were given")]
    MissingHeaders,
    #[error("malformed message header: {source}")]
    Parse {
        #[source]
        source: mailparse::MailParseError,
    },
    #[error("malformed address list in {field}: {source}")]
    AddressList {
        field: String,
        #[source]
        source: mailparse::MailParseError,
    },
    #[error("no sender address could be determined")]
    MissingSender,
    #[error("no recipients listed")]
    NoRecipients,
    #[error("address {address:?} contains CR or LF")]
    LineBreak { address: String },
    #[error("invalid address {address}: {reasons}")]
    InvalidAddress { address: String, reasons: String },
}

impl EnvelopeError {
    pub(crate) fn parse(source: mailparse::MailParseError) -> Self {
        Self::Parse { source }
    }

    pub(crate) fn address_list(field: &str, source: mailparse::MailParseError) -> Self {
        Self::AddressList {
            field: field.to_string(),
            source,
        }
    }
}
