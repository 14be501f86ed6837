//! Useful Regex constants for use with `pcre!`

/// Account and group names this tool is willing to manage
pub const USERNAME: &str = r"^[A-Za-z_][A-Za-z0-9_-]*$";

/// `dscl . -list <path> <attribute>` rows: record name, then a numeric value
pub const DSCL_ID_ROW: &str = r"(?m)^\S+[ \t]+(-?[0-9]+)[ \t]*$";

/// First line of an attribute as printed by `dscl . -read`. Values that don't
/// fit on the line are continued on following lines indented by a space
pub const DSCL_ATTRIBUTE: &str = r"^(\S+?):(?:\s+(.*))?$";
