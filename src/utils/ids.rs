//! Numeric ID allocation for backends that don't pick IDs themselves
//!
//! Allocation is a plain scan of the namespace as it is right now. Nothing is
//! locked, so two invocations racing each other can hand out the same ID. The
//! tool is meant for one operator at a terminal, which makes that acceptable
use crate::{
    pcre,
    utils::{error::AccountError, regex::DSCL_ID_ROW},
};

/// First ID handed to a locally created account or group. Everything below is
/// left for system accounts
pub const BASELINE_ID: u32 = 501;

/// One past the highest ID in use, never lower than [`BASELINE_ID`]
///
/// ```
/// # use acct_rs::utils::ids::next_id;
/// assert_eq!(next_id([]).ok(), Some(501));
/// assert_eq!(next_id([501, 503, 600]).ok(), Some(601));
/// assert!(next_id([u32::MAX]).is_err());
/// ```
pub fn next_id<I: IntoIterator<Item = u32>>(existing: I) -> Result<u32, AccountError> {
    match existing.into_iter().max() {
        None => Ok(BASELINE_ID),
        Some(max) => max
            .checked_add(1)
            .map(|id| id.max(BASELINE_ID))
            .ok_or_else(|| {
                AccountError::precondition(format!("no free ID left: {max} is already taken"))
            }),
    }
}

/// Pull the numeric column out of `dscl . -list /Users UniqueID` (or
/// `/Groups PrimaryGroupID`) output
///
/// Negative IDs such as `nobody`'s -2 are not candidates for allocation and are
/// dropped, as are rows that don't parse
pub fn parse_dscl_ids(listing: &str) -> Vec<u32> {
    pcre!(listing =~ m/DSCL_ID_ROW/g)
        .into_iter()
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .collect()
}
