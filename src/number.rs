use serde::Deserialize;

use crate::ast::{Decimal, Number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberNotation {
    #[default]
    Auto,
    Scientific,
    Engineering,
}

/// How numbers are written out as LaTeX.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NumberFormat {
    /// Significant digit budget. At most `precision - 1` fractional digits are shown.
    pub precision: usize,
    pub decimal_marker: String,
    pub group_separator: String,
    pub exponent_product: String,
    pub begin_repeating_digits: String,
    pub end_repeating_digits: String,
    pub truncation_marker: String,
    pub positive_infinity: String,
    pub negative_infinity: String,
    pub not_a_number: String,
    pub notation: NumberNotation,
    pub large_exponent: i64,
    pub small_exponent: i64,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat {
            precision: 15,
            decimal_marker: ".".to_string(),
            group_separator: "\\,".to_string(),
            exponent_product: "\\cdot".to_string(),
            begin_repeating_digits: "\\overline{".to_string(),
            end_repeating_digits: "}".to_string(),
            truncation_marker: "\\ldots".to_string(),
            positive_infinity: "\\infty".to_string(),
            negative_infinity: "-\\infty".to_string(),
            not_a_number: "\\operatorname{NaN}".to_string(),
            notation: NumberNotation::Auto,
            large_exponent: 21,
            small_exponent: -7,
        }
    }
}

/// Significant digits `d1 d2 d3 ...` read as `d1.d2d3... × 10^exponent`.
struct Significand {
    digits: String,
    exponent: i64,
}

impl Significand {
    fn from_f64(value: f64) -> Significand {
        let formatted = format!("{:e}", value.abs());
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        Significand {
            digits: mantissa.chars().filter(|c| c.is_ascii_digit()).collect(),
            exponent: exponent.parse().unwrap_or(0),
        }
    }

    fn from_decimal(decimal: &Decimal) -> Significand {
        let all: String = format!("{}{}", decimal.whole, decimal.fraction);
        let point = decimal.whole.len() as i64 + decimal.exponent.unwrap_or(0);
        let leading = all.bytes().take_while(|b| *b == b'0').count();
        let digits = all[leading..].trim_end_matches('0');
        if digits.is_empty() {
            return Significand {
                digits: "0".to_string(),
                exponent: 0,
            };
        }
        Significand {
            digits: digits.to_string(),
            exponent: point - 1 - leading as i64,
        }
    }

    /// Splits into whole and fractional digit strings, with `shift` extra
    /// digits moved into the whole part.
    fn split(&self, shift: i64) -> (String, String) {
        let whole_len = shift + 1;
        if whole_len <= 0 {
            let zeros = "0".repeat((-whole_len) as usize);
            return ("0".to_string(), format!("{zeros}{}", self.digits));
        }
        let whole_len = whole_len as usize;
        if whole_len >= self.digits.len() {
            let zeros = "0".repeat(whole_len - self.digits.len());
            (format!("{}{zeros}", self.digits), String::new())
        } else {
            (
                self.digits[..whole_len].to_string(),
                self.digits[whole_len..].to_string(),
            )
        }
    }
}

/// The shortest decimal string that reads back as `value`, written the way
/// ECMAScript's `Number.prototype.toString` writes it.
pub fn shortest_repr(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let Significand { digits, exponent } = Significand::from_f64(value);
    let k = digits.len() as i64;
    let n = exponent + 1;

    let body = if k <= n && n <= 21 {
        format!("{digits}{}", "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
    } else if -6 < n && n <= 0 {
        format!("0.{}{digits}", "0".repeat((-n) as usize))
    } else {
        let exp_sign = if n - 1 < 0 { '-' } else { '+' };
        let exp = (n - 1).abs();
        if k == 1 {
            format!("{digits}e{exp_sign}{exp}")
        } else {
            format!("{}.{}e{exp_sign}{exp}", &digits[..1], &digits[1..])
        }
    };
    format!("{sign}{body}")
}

/// Writes a number out as LaTeX.
pub fn format_number(number: &Number, format: &NumberFormat) -> String {
    match number {
        Number::Machine(value) => format_machine(*value, format),
        Number::Decimal(decimal) => format_decimal(decimal, format),
    }
}

fn format_machine(value: f64, format: &NumberFormat) -> String {
    if value.is_nan() {
        return format.not_a_number.clone();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            format.positive_infinity.clone()
        } else {
            format.negative_infinity.clone()
        };
    }
    let significand = Significand::from_f64(value);
    render_significand(value < 0.0, &significand, format, format.notation)
}

fn format_decimal(decimal: &Decimal, format: &NumberFormat) -> String {
    if decimal.repeating.is_empty() && format.notation != NumberNotation::Auto {
        let significand = Significand::from_decimal(decimal);
        let negative = decimal.negative && !decimal.is_zero();
        return render_significand(negative, &significand, format, format.notation);
    }
    let whole = decimal.whole.trim_start_matches('0');
    let whole = if whole.is_empty() { "0" } else { whole };
    render_parts(
        decimal.negative && !decimal.is_zero(),
        whole,
        &decimal.fraction,
        &decimal.repeating,
        decimal.exponent.filter(|e| *e != 0),
        format,
    )
}

fn render_significand(
    negative: bool,
    significand: &Significand,
    format: &NumberFormat,
    notation: NumberNotation,
) -> String {
    let exponent = significand.exponent;
    let shift = match notation {
        NumberNotation::Auto
            if format.small_exponent < exponent && exponent < format.large_exponent =>
        {
            exponent
        }
        NumberNotation::Auto | NumberNotation::Scientific => 0,
        NumberNotation::Engineering => exponent.rem_euclid(3),
    };
    let (whole, fraction) = significand.split(shift);
    let remaining = exponent - shift;
    render_parts(
        negative,
        &whole,
        &fraction,
        "",
        (remaining != 0).then_some(remaining),
        format,
    )
}

fn render_parts(
    negative: bool,
    whole: &str,
    fraction: &str,
    repeating: &str,
    exponent: Option<i64>,
    format: &NumberFormat,
) -> String {
    let mut mantissa = group_whole(whole, &format.group_separator);

    let fraction_text = if !repeating.is_empty() {
        format!(
            "{}{}{repeating}{}",
            group_fraction(fraction, &format.group_separator),
            format.begin_repeating_digits,
            format.end_repeating_digits
        )
    } else {
        format_fraction(fraction, format)
    };
    if !fraction_text.is_empty() {
        mantissa.push_str(&format.decimal_marker);
        mantissa.push_str(&fraction_text);
    }

    let sign = if negative { "-" } else { "" };
    match exponent {
        None => format!("{sign}{mantissa}"),
        Some(exponent) if mantissa == "1" => format!("{sign}10^{{{exponent}}}"),
        Some(exponent) => format!("{sign}{mantissa}{}10^{{{exponent}}}", format.exponent_product),
    }
}

fn format_fraction(fraction: &str, format: &NumberFormat) -> String {
    let budget = format.precision.saturating_sub(1).max(1);
    if fraction.len() <= budget {
        return group_fraction(fraction, &format.group_separator);
    }
    match find_repeating(fraction, format.precision) {
        Some((prefix, cycle)) if cycle == "0" => group_fraction(prefix, &format.group_separator),
        Some((prefix, cycle)) => format!(
            "{}{}{cycle}{}",
            group_fraction(prefix, &format.group_separator),
            format.begin_repeating_digits,
            format.end_repeating_digits
        ),
        None => format!(
            "{}{}",
            group_fraction(&fraction[..budget], &format.group_separator),
            format.truncation_marker
        ),
    }
}

/// Looks for a repeating cycle in a run of fractional digits, returning the
/// non-repeating prefix and the cycle. The last digit is ignored since it
/// may have been rounded.
fn find_repeating(fraction: &str, precision: usize) -> Option<(&str, &str)> {
    let candidate = &fraction[..fraction.len().saturating_sub(1)];
    let bytes = candidate.as_bytes();
    let mut offset = 0;
    while candidate.len() - offset >= precision.max(1) {
        let rest = &bytes[offset..];
        for period in 1..=precision + 2 {
            if period * 2 > rest.len() {
                break;
            }
            if rest.iter().enumerate().all(|(i, b)| *b == rest[i % period]) {
                return Some((&candidate[..offset], &candidate[offset..offset + period]));
            }
        }
        offset += 1;
    }
    None
}

fn group_whole(digits: &str, separator: &str) -> String {
    if separator.is_empty() || digits.len() <= 3 {
        return digits.to_string();
    }
    let head = digits.len() % 3;
    let mut groups = Vec::new();
    if head > 0 {
        groups.push(&digits[..head]);
    }
    let mut i = head;
    while i < digits.len() {
        groups.push(&digits[i..i + 3]);
        i += 3;
    }
    groups.join(separator)
}

fn group_fraction(digits: &str, separator: &str) -> String {
    if separator.is_empty() || digits.len() <= 3 {
        return digits.to_string();
    }
    digits
        .as_bytes()
        .chunks(3)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(separator)
}
