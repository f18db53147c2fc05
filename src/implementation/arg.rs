/// The argument to `pushdb`, coerced once at the command boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackArg {
    NoArg,
    SignedIndex(i64),
    Name(String),
}

impl StackArg {
    /// `""` is no argument, anything starting with `+<digits>` or `-<digits>`
    /// is an index, everything else is a database name.
    pub fn parse(arg: &str) -> Self {
        if arg.is_empty() {
            return StackArg::NoArg;
        }
        match arg.as_bytes()[0] {
            b'+' | b'-' => {
                let (negative, digits) = split_sign(arg);
                match integer_prefix(digits, 10, negative) {
                    Some(n) => StackArg::SignedIndex(n),
                    None => StackArg::Name(arg.to_owned()),
                }
            }
            _ => StackArg::Name(arg.to_owned()),
        }
    }
}

/// Depth argument of `popdb`, read the way `parseInt` reads it: leading
/// whitespace, an optional sign, then decimal digits or `0x` and hex digits.
/// Empty means 0, `None` means not an integer.
pub fn parse_depth(arg: &str) -> Option<i64> {
    if arg.is_empty() {
        return Some(0);
    }
    let (negative, rest) = split_sign(arg.trim_start());
    match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(hex) => integer_prefix(hex, 16, negative),
        None => integer_prefix(rest, 10, negative),
    }
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    }
}

/// Reads the leading run of digits in `radix`, ignoring whatever follows.
/// Values outside `i64` saturate.
fn integer_prefix(digits: &str, radix: u32, negative: bool) -> Option<i64> {
    let mut value: i64 = 0;
    let mut seen = false;
    for d in digits.chars().map_while(|c| c.to_digit(radix)) {
        seen = true;
        let d = i64::from(d);
        let base = value.saturating_mul(i64::from(radix));
        value = if negative {
            base.saturating_sub(d)
        } else {
            base.saturating_add(d)
        };
    }
    seen.then_some(value)
}
