use std::io::{self, BufRead};

/// Reads the message from `reader`. Unless `ignore_dot` is set, a line
/// holding only "." ends the input, as in sendmail.
pub fn read_message<R: BufRead>(mut reader: R, ignore_dot: bool) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if !ignore_dot && trim_newline(&line) == b"." {
            break;
        }
        body.extend_from_slice(&line);
    }
    Ok(body)
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
