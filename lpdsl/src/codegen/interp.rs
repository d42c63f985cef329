use crate::codegen::constant::get_in;
use crate::codegen::env::Env;
use crate::codegen::error::CodegenError;
use crate::Key;

/// Fills `{sym}` / `{sym.field}` placeholders from `env`. `{{` and `}}` are literal braces.
pub fn interpolate(template: &str, env: &Env) -> Result<String, CodegenError> {
    let bad = |reason: &'static str| CodegenError::Template {
        template: template.to_string(),
        reason,
    };
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(bad("unmatched `}`")),
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(bad("unclosed `{`")),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(bad("empty placeholder"));
                }
                out.push_str(&placeholder(name, env)?);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn placeholder(name: &str, env: &Env) -> Result<String, CodegenError> {
    let mut parts = name.split('.');
    let root = parts.next().unwrap_or(name);
    let mut cur = env.resolve(root)?;
    let mut path = vec![root.to_string()];
    for part in parts {
        let key = match part.parse::<i64>() {
            Ok(n) => Key::Int(n),
            Err(_) => Key::Tag(part.to_string()),
        };
        path.push(part.to_string());
        cur = get_in(cur, &key).ok_or_else(|| CodegenError::MissingKey { path: path.clone() })?;
    }
    Ok(cur.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::env::Parameters;
    use crate::Value;

    #[test]
    fn test_interpolate() {
        let params = Parameters::new().with("site", Value::map([("name", "north")]));
        let env = Env::new(&params)
            .overlay("i", Value::Num(3.0))
            .overlay("f", Value::from("bread"));
        assert_eq!(interpolate("row_{i}", &env).unwrap(), "row_3");
        assert_eq!(interpolate("{f} at { site.name }", &env).unwrap(), "bread at north");
        assert_eq!(interpolate("{{i}}", &env).unwrap(), "{i}");
    }

    #[test]
    fn test_interpolate_errors() {
        let params = Parameters::new();
        let env = Env::new(&params);
        assert!(matches!(
            interpolate("row_{j}", &env),
            Err(CodegenError::UnknownSymbol(s)) if s == "j"
        ));
        assert!(matches!(interpolate("row_{i", &env), Err(CodegenError::Template { .. })));
        assert!(matches!(interpolate("row_}", &env), Err(CodegenError::Template { .. })));
    }
}
