use crate::error::ProbeError;

/// Split a status line such as `"200 OK"` into its code and message
pub fn parse_status(status: &str) -> Result<(u16, String), ProbeError> {
    let split: Vec<&str> = status.split(' ').collect();
    if split.len() < 2 {
        return Err(ProbeError::Protocol(format!("response status is not correct: {status}")));
    }

    let code = split[0]
        .parse::<u16>()
        .map_err(|e| ProbeError::Protocol(format!("invalid status code {}: {e}", split[0])))?;

    Ok((code, split[1..].join(" ")))
}
