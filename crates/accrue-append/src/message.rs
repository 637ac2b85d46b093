use serde_json::Value;

/// Render a number for log text: integral values without a fractional part,
/// `NaN` and `Infinity` spelled out.
fn number_text(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn as_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// String form of a value: strings verbatim, everything else as JSON.
fn string_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => number_text(as_number(value)),
        other => other.to_string(),
    }
}

/// Printf-style substitution of positional arguments.
///
/// Supported placeholders: `%s` (string form), `%d` (number), `%i`
/// (integer), `%f` (float), `%j` / `%o` / `%O` (JSON) and `%%` (a literal
/// percent sign). A placeholder without a remaining argument is left as is;
/// arguments without a placeholder are appended, separated by spaces.
///
/// Without arguments the template is returned unchanged, `%%` included.
pub fn format_message(template: &str, args: &[Value]) -> String {
    if args.is_empty() {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(&spec) = chars.peek() else {
            out.push('%');
            break;
        };
        if spec == '%' {
            chars.next();
            out.push('%');
            continue;
        }
        if !matches!(spec, 's' | 'd' | 'i' | 'f' | 'j' | 'o' | 'O') {
            out.push('%');
            continue;
        }
        chars.next();
        let Some(arg) = args.next() else {
            out.push('%');
            out.push(spec);
            continue;
        };
        let rendered = match spec {
            's' => string_text(arg),
            'd' => number_text(as_number(arg)),
            'i' => number_text(as_number(arg).trunc()),
            'f' => number_text(as_number(arg)),
            _ => arg.to_string(),
        };
        out.push_str(&rendered);
    }

    for extra in args {
        out.push(' ');
        out.push_str(&string_text(extra));
    }
    out
}
