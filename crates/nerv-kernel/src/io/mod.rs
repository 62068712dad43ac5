//! Transport-facing request intake and response delivery.

mod input;
mod output;

pub use self::input::{GATEWAY_INTERFACE, InputError, Request, detect_mode, parse_data_arg};
pub use self::output::{
    CgiWriter, CliWriter, OutputError, OutputSink, Response, STATUS_INTERNAL_ERROR, STATUS_NOT_ACCEPTABLE,
    STATUS_OK,
};
