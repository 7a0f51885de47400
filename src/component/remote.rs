// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote URL handling.
//!
//! Components are fetched over whatever the user hands us, usually plain
//! HTTPS. Pushing back to the same host generally needs SSH instead, so a best
//! effort push URL is derived from the fetch URL.

/// Logical name of the single remote every component repository uses.
pub const REMOTE_NAME: &str = "origin";

const SSH_PREFIX: &str = "ssh://git@";

/// Derive push URL from fetch URL.
///
/// Replaces a leading `http://` or `https://` with `ssh://git@`, leaving the
/// rest of the URL byte-for-byte untouched. Anything else, e.g., `ssh://`,
/// scp-like `git@host:path`, or local paths, is returned unchanged. The scheme
/// match is case-sensitive.
pub fn derive_push_url(fetch_url: impl AsRef<str>) -> String {
    let fetch_url = fetch_url.as_ref();
    match fetch_url
        .strip_prefix("https://")
        .or_else(|| fetch_url.strip_prefix("http://"))
    {
        Some(rest) => format!("{SSH_PREFIX}{rest}"),
        None => fetch_url.to_string(),
    }
}
