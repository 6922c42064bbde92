// Display formatting for counters and wallet addresses.

/// Format a per-profile vote count: `1234 -> "1.2K"`, `999 -> "999"`.
pub fn format_vote_count(count: u64) -> String {
    if count >= 1000 {
        format!("{:.1}K", count as f64 / 1000.0)
    } else {
        count.to_string()
    }
}

/// Format a global aggregate counter with `M`/`K` suffixes.
pub fn format_number(num: u64) -> String {
    if num >= 1_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else if num >= 1000 {
        format!("{:.1}K", num as f64 / 1000.0)
    } else {
        num.to_string()
    }
}

/// Format a leaderboard score: two decimals above one thousand (`1.23k`).
pub fn format_score(votes: u64) -> String {
    if votes >= 1000 {
        format!("{:.2}k", votes as f64 / 1000.0)
    } else {
        votes.to_string()
    }
}

/// Shorten a wallet address to its first and last four characters.
///
/// Addresses of eight characters or fewer are returned unchanged.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
