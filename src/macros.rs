#[macro_export]
macro_rules! define_commands {
    ($($cmd:ident$(, $alias:ident)? => $($struct:ident)::+),+$(,)?) => {
        #[derive(::clap::Subcommand, Debug)]
        enum Commands {
            $(
                $(#[command(alias = stringify!($alias))])?
                $cmd($($struct)::+)
            ),+,
        }

        impl Commands {
            fn execute(self, backend: &$crate::utils::backend::Backend) -> eyre::Result<()> {
                use $crate::commands::Command;

                fn _type_check<F: $crate::commands::Command>(_a: &F) {}

                match self {
                    $(Self::$cmd(inner) => {
                        _type_check(&inner);
                        inner.execute(backend)
                    }),+,
                }
            }
        }
    };
}

#[macro_export]
macro_rules! flags {
    () => {{ (false, String::new()) }};
    ($flags:ident) => {{
        let flags = stringify!($flags);
        let mut global = false;
        let other_flags = flags
            .chars()
            .filter_map(|c| match c {
                'g' => {
                    global = true;
                    None
                }
                'x' | 'm' | 's' | 'i' => Some(c.to_string()),
                _ => None,
            })
            .collect::<String>();

        (global, other_flags)
    }};
}

#[macro_export]
macro_rules! pcre_format_regex {
    ($regex:tt $($flags:ident)?) => {{
        let (global, other_flags) = $crate::flags!($($flags)?);
        let regex: &str = $regex;
        let re = if other_flags.is_empty() {
            ::regex::Regex::new(regex)
        } else {
            ::regex::Regex::new(&format!("(?{other_flags}){regex}"))
        }
        .unwrap_or_else(|e| panic!("Regex provided is invalid: {regex}: {e}"));

        (global, re)
    }};
}

/// Perl style matching on top of the regex crate
///
/// Two forms are supported:
///
/// ```
/// use acct_rs::pcre;
///
/// // Does it match?
/// assert!( pcre!("alice" =~ qr/r"^[a-z]+$"/));
/// assert!(!pcre!("Alice" =~ qr/r"^[a-z]+$"/));
/// assert!( pcre!("Alice" =~ qr/r"^[a-z]+$"/i));
///
/// // Collect captures; `g` collects every match instead of just the first
/// let listing = String::from("alice 501\nbob 502\n");
/// let rows = pcre!(&listing =~ m/r"(?m)^(\S+) ([0-9]+)$"/g);
/// assert_eq!(rows.len(), 2);
/// assert_eq!(&rows[1][1], "bob");
/// assert_eq!(pcre!(&listing =~ m/r"(?m)^(\S+) ([0-9]+)$"/).len(), 1);
/// ```
///
/// Patterns may be string literals or `&str` constants such as the ones in
/// [`crate::utils::regex`]. Flags other than `g` are passed through as inline
/// regex flags
#[macro_export]
macro_rules! pcre {
    (($inp:expr) =~ m/$regex:tt/ $($flags:ident)?) => {{
        let (global, re) = $crate::pcre_format_regex!($regex $($flags)?);

        if global {
            re.captures_iter($inp).collect::<Vec<_>>()
        } else {
            re.captures_iter($inp).take(1).collect::<Vec<_>>()
        }
    }};

    (($inp:expr) =~ qr/$regex:tt/ $($flags:ident)?) => {{
        let (_, re) = $crate::pcre_format_regex!($regex $($flags)?);
        re.is_match($inp)
    }};

    (& $inp:tt $($tt:tt)*) => {{
        $crate::pcre!((&$inp) $($tt)*)
    }};

    ($inp:tt $($tt:tt)*) => {{
        $crate::pcre!(($inp) $($tt)*)
    }};
}
