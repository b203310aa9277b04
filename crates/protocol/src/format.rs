/// Format a latency given in seconds.
pub fn format_latency(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{seconds:.2}s")
    } else {
        let total = seconds.round() as u64;
        format!("{}m {}s", total / 60, total % 60)
    }
}

/// Format a cost in USD. Small costs keep enough digits to stay non-zero.
pub fn format_cost(usd: f64) -> String {
    if usd == 0.0 {
        "$0.00".to_string()
    } else if usd < 0.01 {
        format!("${usd:.6}")
    } else {
        format!("${usd:.2}")
    }
}

/// Format a token count ("950", "1.2k", "3.4M").
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency() {
        assert_eq!(format_latency(0.85), "850ms");
        assert_eq!(format_latency(1.25), "1.25s");
        assert_eq!(format_latency(125.0), "2m 5s");
    }

    #[test]
    fn cost() {
        assert_eq!(format_cost(0.0), "$0.00");
        assert_eq!(format_cost(0.000123), "$0.000123");
        assert_eq!(format_cost(1.5), "$1.50");
    }

    #[test]
    fn tokens() {
        assert_eq!(format_tokens(950), "950");
        assert_eq!(format_tokens(1_234), "1.2k");
        assert_eq!(format_tokens(3_400_000), "3.4M");
    }
}
