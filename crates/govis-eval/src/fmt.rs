//! `fmt`-style printing of runtime values.
//!
//! Output follows Go's `fmt` package for the verbs the evaluator supports:
//! `%v %+v %#v %d %s %q %t %T %f %%`, with width and `-`/`0` flags.
//! Malformed directives produce the same `%!verb(type=value)` markers Go
//! prints instead of failing.

use std::fmt::Write;
use std::rc::Rc;

use crate::value::{Pointer, StructValue, Value};

/// `fmt.Print`: operands are separated by a space when neither side is a string.
pub fn sprint(args: &[Value<'_>]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            let prev_is_string = matches!(args[i - 1], Value::String(_));
            let this_is_string = matches!(arg, Value::String(_));
            if !prev_is_string && !this_is_string {
                out.push(' ');
            }
        }
        write_value(&mut out, arg, Mode::Plain, 0);
    }
    out
}

/// `fmt.Println`: operands always separated by a space, then a newline.
pub fn sprintln(args: &[Value<'_>]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_value(&mut out, arg, Mode::Plain, 0);
    }
    out.push('\n');
    out
}

/// `fmt.Sprintf`.
pub fn sprintf(format: &str, args: &[Value<'_>]) -> String {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '+' => spec.plus = true,
                '#' => spec.sharp = true,
                '-' => spec.minus = true,
                '0' => spec.zero = true,
                ' ' => {}
                _ => break,
            }
            chars.next();
        }
        spec.width = read_number(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(read_number(&mut chars).unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }

        match args.get(next_arg) {
            Some(arg) => {
                let mut formatted = String::new();
                write_verb(&mut formatted, arg, verb, &spec);
                pad(&mut out, &formatted, &spec, arg);
                next_arg += 1;
            }
            None => {
                let _ = write!(out, "%!{verb}(MISSING)");
            }
        }
    }

    if next_arg < args.len() {
        out.push_str("%!(EXTRA ");
        for (i, arg) in args[next_arg..].iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}=", arg.type_name());
            write_value(&mut out, arg, Mode::Plain, 0);
        }
        out.push(')');
    }

    out
}

#[derive(Debug, Default, Clone)]
struct Spec {
    plus: bool,
    sharp: bool,
    minus: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// How `%v` renders composite values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// `%v`: `{doej 101 }`
    Plain,
    /// `%+v`: `{Name:doej ID:101 password:}`
    Fields,
    /// `%#v`: `users.User{Name:"doej", ID:101, password:""}`
    GoSyntax,
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut number: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        number = Some(number.unwrap_or(0).saturating_mul(10).saturating_add(digit as usize));
        chars.next();
    }
    number
}

fn pad(out: &mut String, formatted: &str, spec: &Spec, arg: &Value<'_>) {
    let len = formatted.chars().count();
    let fill = spec.width.unwrap_or(0).saturating_sub(len);
    if fill == 0 {
        out.push_str(formatted);
    } else if spec.minus {
        out.push_str(formatted);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if spec.zero && matches!(arg, Value::Int(..) | Value::Float(..)) {
        let (sign, digits) = match formatted.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", formatted),
        };
        out.push_str(sign);
        out.extend(std::iter::repeat('0').take(fill));
        out.push_str(digits);
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(formatted);
    }
}

fn write_verb(out: &mut String, value: &Value<'_>, verb: char, spec: &Spec) {
    match verb {
        'v' => {
            let mode = if spec.sharp {
                Mode::GoSyntax
            } else if spec.plus {
                Mode::Fields
            } else {
                Mode::Plain
            };
            write_value(out, value, mode, 0);
        }
        'T' => out.push_str(&value.type_name()),
        'd' => match value {
            Value::Int(v, _) => {
                if spec.plus && *v >= 0 {
                    out.push('+');
                }
                let _ = write!(out, "{v}");
            }
            _ => write_elements(out, value, verb, spec),
        },
        's' => match value {
            Value::String(s) => match spec.precision {
                Some(max) => out.extend(s.chars().take(max)),
                None => out.push_str(s),
            },
            _ => write_elements(out, value, verb, spec),
        },
        'q' => match value {
            Value::String(s) => out.push_str(&quote(s)),
            Value::Int(v, _) => match u32::try_from(*v).ok().and_then(char::from_u32) {
                Some(c) => out.push_str(&quote_rune(c)),
                None => bad_verb(out, value, verb),
            },
            _ => write_elements(out, value, verb, spec),
        },
        't' => match value {
            Value::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            _ => write_elements(out, value, verb, spec),
        },
        'f' | 'F' => match value {
            Value::Float(v, _) => {
                let _ = write!(out, "{:.*}", spec.precision.unwrap_or(6), v);
            }
            _ => write_elements(out, value, verb, spec),
        },
        _ => bad_verb(out, value, verb),
    }
}

/// Apply a scalar verb to each element of a struct, slice or pointed-to
/// struct, the way Go does for `%d` on `{1 2}`.
fn write_elements(out: &mut String, value: &Value<'_>, verb: char, spec: &Spec) {
    match value {
        Value::Struct(st) => {
            out.push('{');
            for (i, (name, field)) in st.fields.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                if spec.plus {
                    let _ = write!(out, "{name}:");
                }
                write_verb(out, field, verb, spec);
            }
            out.push('}');
        }
        Value::Slice(slice) => {
            out.push('[');
            for (i, item) in slice.items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_verb(out, item, verb, spec);
            }
            out.push(']');
        }
        Value::Pointer(Pointer {
            target: Some(target),
            ..
        }) if matches!(&*target.borrow(), Value::Struct(_)) => {
            out.push('&');
            write_elements(out, &target.borrow(), verb, spec);
        }
        _ => bad_verb(out, value, verb),
    }
}

fn bad_verb(out: &mut String, value: &Value<'_>, verb: char) {
    if let Value::Nil = value {
        let _ = write!(out, "%!{verb}(<nil>)");
        return;
    }
    let _ = write!(out, "%!{verb}({}=", value.type_name());
    write_value(out, value, Mode::Plain, 0);
    out.push(')');
}

fn write_value(out: &mut String, value: &Value<'_>, mode: Mode, depth: usize) {
    match value {
        Value::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Int(v, _) => {
            let _ = write!(out, "{v}");
        }
        Value::Float(v, _) => out.push_str(&format_float(*v)),
        Value::String(s) => match mode {
            Mode::GoSyntax => out.push_str(&quote(s)),
            Mode::Plain | Mode::Fields => out.push_str(s),
        },
        Value::Struct(st) => write_struct(out, st, mode, depth),
        Value::Pointer(ptr) => write_pointer(out, ptr, mode, depth),
        Value::Slice(slice) => {
            if mode == Mode::GoSyntax {
                out.push_str(&value.type_name());
                out.push('{');
            } else {
                out.push('[');
            }
            for (i, item) in slice.items.iter().enumerate() {
                if i > 0 {
                    out.push_str(if mode == Mode::GoSyntax { ", " } else { " " });
                }
                write_value(out, item, mode, depth + 1);
            }
            out.push(if mode == Mode::GoSyntax { '}' } else { ']' });
        }
        Value::Nil => out.push_str("<nil>"),
    }
}

fn write_struct(out: &mut String, st: &StructValue<'_>, mode: Mode, depth: usize) {
    if mode == Mode::GoSyntax {
        out.push_str(&st.layout.display);
    }
    out.push('{');
    for (i, (name, field)) in st.fields.iter().enumerate() {
        if i > 0 {
            out.push_str(if mode == Mode::GoSyntax { ", " } else { " " });
        }
        if mode != Mode::Plain {
            let _ = write!(out, "{name}:");
        }
        write_value(out, field, mode, depth + 1);
    }
    out.push('}');
}

/// Top-level pointers to structs print as `&{...}`; anything nested
/// prints as an address, so cycles terminate.
fn write_pointer(out: &mut String, ptr: &Pointer<'_>, mode: Mode, depth: usize) {
    let Some(target) = &ptr.target else {
        match mode {
            Mode::GoSyntax => {
                let _ = write!(out, "(*{})(nil)", ptr.pointee.display());
            }
            Mode::Plain | Mode::Fields => out.push_str("<nil>"),
        }
        return;
    };

    if depth == 0 {
        if let Value::Struct(st) = &*target.borrow() {
            out.push('&');
            write_struct(out, st, mode, depth + 1);
            return;
        }
    }

    let address = format!("{:p}", Rc::as_ptr(target));
    match mode {
        Mode::GoSyntax => {
            let _ = write!(out, "(*{})({address})", ptr.pointee.display());
        }
        Mode::Plain | Mode::Fields => out.push_str(&address),
    }
}

/// Shortest representation, in exponent form when the decimal exponent is
/// below -4 or at least 6, like Go's `%v`.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let scientific = format!("{v:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exp: i32 = exponent.parse().unwrap_or(0);
    if exp < -4 || exp >= 6 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.abs());
    }
    format!("{v}")
}

/// Go `strconv.Quote`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        escape_into(&mut out, c, '"');
    }
    out.push('"');
    out
}

fn quote_rune(c: char) -> String {
    let mut out = String::from('\'');
    escape_into(&mut out, c, '\'');
    out.push('\'');
    out
}

fn escape_into(out: &mut String, c: char, delimiter: char) {
    match c {
        '\x07' => out.push_str("\\a"),
        '\x08' => out.push_str("\\b"),
        '\x0c' => out.push_str("\\f"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\x0b' => out.push_str("\\v"),
        '\\' => out.push_str("\\\\"),
        c if c == delimiter => {
            out.push('\\');
            out.push(c);
        }
        c if c.is_control() => {
            let code = c as u32;
            if code < 0x80 {
                let _ = write!(out, "\\x{code:02x}");
            } else if code <= 0xffff {
                let _ = write!(out, "\\u{code:04x}");
            } else {
                let _ = write!(out, "\\U{code:08x}");
            }
        }
        c => out.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govis_hir::PrimitiveType;

    #[test]
    fn test_print_spacing() {
        let args = [Value::int(1), Value::int(2), Value::string("a"), Value::int(3)];
        assert_eq!(sprint(&args), "1 2a3");
        assert_eq!(sprintln(&args), "1 2 a 3\n");
    }

    #[test]
    fn test_scalar_verbs() {
        let args = [
            Value::string("doej"),
            Value::int(101),
            Value::Bool(true),
            Value::string("a\"b\n"),
        ];
        assert_eq!(sprintf("%s/%d/%t/%q", &args), "doej/101/true/\"a\\\"b\\n\"");
        assert_eq!(sprintf("%v %T", &[Value::int(7), Value::string("x")]), "7 string");
        assert_eq!(sprintf("100%%", &[]), "100%");
        assert_eq!(sprintf("%q", &[Value::Int('x' as i64, PrimitiveType::Int32)]), "'x'");
    }

    #[test]
    fn test_width_and_flags() {
        assert_eq!(sprintf("[%5d]", &[Value::int(42)]), "[   42]");
        assert_eq!(sprintf("[%-5d]", &[Value::int(42)]), "[42   ]");
        assert_eq!(sprintf("[%05d]", &[Value::int(-42)]), "[-0042]");
        assert_eq!(sprintf("[%+d]", &[Value::int(3)]), "[+3]");
        assert_eq!(sprintf("[%.2f]", &[Value::Float(3.14159, PrimitiveType::Float64)]), "[3.14]");
        assert_eq!(sprintf("[%.3s]", &[Value::string("abcdef")]), "[abc]");
    }

    #[test]
    fn test_bad_directives() {
        assert_eq!(sprintf("%d", &[Value::string("hi")]), "%!d(string=hi)");
        assert_eq!(sprintf("%d %d", &[Value::int(1)]), "1 %!d(MISSING)");
        assert_eq!(
            sprintf("%d", &[Value::int(1), Value::string("x"), Value::int(2)]),
            "1%!(EXTRA string=x, int=2)"
        );
        assert_eq!(sprintf("%z", &[Value::int(1)]), "%!z(int=1)");
        assert_eq!(sprintf("end %", &[]), "end %!(NOVERB)");
    }

    #[test]
    fn test_floats() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(123456.0), "123456");
        assert_eq!(format_float(1e6), "1e+06");
        assert_eq!(format_float(1.5e21), "1.5e+21");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(-2.5), "-2.5");
    }

    #[test]
    fn test_quote_controls() {
        assert_eq!(quote("tab\there"), "\"tab\\there\"");
        assert_eq!(quote("\u{1}"), "\"\\x01\"");
        assert_eq!(quote("héllo"), "\"héllo\"");
    }
}
