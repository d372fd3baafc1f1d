//! XPath 1.0 Functions
//!
//! Node Set Functions:
//! - position(), last(), count(), local-name(), namespace-uri(), name()
//!
//! String Functions:
//! - string(), concat(), starts-with(), ends-with(), contains(), substring(),
//!   substring-before(), substring-after(), string-length(),
//!   normalize-space(), translate(), lower-case(), upper-case()
//!
//! Boolean Functions:
//! - boolean(), not(), true(), false(), lang()
//!
//! Number Functions:
//! - number(), sum(), floor(), ceiling(), round()

use super::eval::EvalContext;
use super::value::{parse_number, XPathNode, XPathValue};
use crate::dom::DocumentAccess;

/// Accepted argument counts; `None` as max means variadic
fn arity(name: &str) -> Option<(usize, Option<usize>)> {
    let range = match name {
        "position" | "last" | "true" | "false" => (0, Some(0)),
        "local-name" | "namespace-uri" | "name" | "string" | "string-length"
        | "normalize-space" | "number" => (0, Some(1)),
        "count" | "boolean" | "not" | "lang" | "sum" | "floor" | "ceiling" | "round"
        | "lower-case" | "upper-case" => (1, Some(1)),
        "starts-with" | "ends-with" | "contains" | "substring-before" | "substring-after" => {
            (2, Some(2))
        }
        "substring" => (2, Some(3)),
        "translate" => (3, Some(3)),
        "concat" => (2, None),
        _ => return None,
    };
    Some(range)
}

/// Check a call at compile time
pub fn check_call(name: &str, args: usize) -> Result<(), String> {
    let (min, max) = arity(name).ok_or_else(|| format!("unknown function: {}()", name))?;
    if args < min || max.is_some_and(|max| args > max) {
        return Err(format!(
            "wrong number of arguments for {}(): {}",
            name, args
        ));
    }
    Ok(())
}

/// Evaluate a function call
pub fn call<D: DocumentAccess>(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, String> {
    let string_arg = |i: usize| ctx.string_of(&args[i]);
    // Zero-argument forms default to the context node.
    let context_string = || match args.first() {
        Some(arg) => ctx.string_of(arg),
        None => ctx.node_string(ctx.node),
    };

    let value = match name {
        "position" => XPathValue::Number(ctx.position as f64),
        "last" => XPathValue::Number(ctx.size as f64),
        "count" => XPathValue::Number(node_set(&args[0], name)?.len() as f64),
        "local-name" => XPathValue::String(
            first_node(&args, ctx, name)?
                .map(|n| ctx.local_name(n))
                .unwrap_or_default(),
        ),
        "namespace-uri" => XPathValue::String(
            first_node(&args, ctx, name)?
                .map(|n| ctx.namespace_uri(n))
                .unwrap_or_default(),
        ),
        "name" => XPathValue::String(
            first_node(&args, ctx, name)?
                .map(|n| ctx.qualified_name(n))
                .unwrap_or_default(),
        ),

        "string" => XPathValue::String(context_string()),
        "concat" => XPathValue::String(args.iter().map(|a| ctx.string_of(a)).collect()),
        "starts-with" => XPathValue::Boolean(string_arg(0).starts_with(&string_arg(1))),
        "ends-with" => XPathValue::Boolean(string_arg(0).ends_with(&string_arg(1))),
        "contains" => XPathValue::Boolean(string_arg(0).contains(&string_arg(1))),
        "substring" => {
            let length = args.get(2).map(|a| ctx.number_of(a));
            XPathValue::String(substring(&string_arg(0), ctx.number_of(&args[1]), length))
        }
        "substring-before" => {
            let (s, pattern) = (string_arg(0), string_arg(1));
            XPathValue::String(s.find(&pattern).map(|i| s[..i].to_string()).unwrap_or_default())
        }
        "substring-after" => {
            let (s, pattern) = (string_arg(0), string_arg(1));
            XPathValue::String(
                s.find(&pattern)
                    .map(|i| s[i + pattern.len()..].to_string())
                    .unwrap_or_default(),
            )
        }
        "string-length" => XPathValue::Number(context_string().chars().count() as f64),
        "normalize-space" => {
            XPathValue::String(context_string().split_whitespace().collect::<Vec<_>>().join(" "))
        }
        "translate" => XPathValue::String(translate(&string_arg(0), &string_arg(1), &string_arg(2))),
        "lower-case" => XPathValue::String(string_arg(0).to_lowercase()),
        "upper-case" => XPathValue::String(string_arg(0).to_uppercase()),

        "boolean" => XPathValue::Boolean(args[0].to_boolean()),
        "not" => XPathValue::Boolean(!args[0].to_boolean()),
        "true" => XPathValue::Boolean(true),
        "false" => XPathValue::Boolean(false),
        "lang" => XPathValue::Boolean(lang(ctx, &string_arg(0))),

        "number" => XPathValue::Number(match args.first() {
            Some(arg) => ctx.number_of(arg),
            None => parse_number(&ctx.node_string(ctx.node)),
        }),
        "sum" => XPathValue::Number(
            node_set(&args[0], name)?
                .iter()
                .map(|&n| parse_number(&ctx.node_string(n)))
                .sum(),
        ),
        "floor" => XPathValue::Number(ctx.number_of(&args[0]).floor()),
        "ceiling" => XPathValue::Number(ctx.number_of(&args[0]).ceil()),
        "round" => XPathValue::Number(round(ctx.number_of(&args[0]))),

        _ => return Err(format!("unknown function: {}()", name)),
    };
    Ok(value)
}

fn node_set<'v>(value: &'v XPathValue, name: &str) -> Result<&'v [XPathNode], String> {
    value.as_nodeset().ok_or_else(|| {
        if name == "count" {
            "expression must evaluate to a node-set".to_string()
        } else {
            format!("{}() argument must be a node-set", name)
        }
    })
}

/// First node of the optional node-set argument, or the context node
fn first_node<D: DocumentAccess>(
    args: &[XPathValue],
    ctx: &EvalContext<'_, D>,
    name: &str,
) -> Result<Option<XPathNode>, String> {
    match args.first() {
        None => Ok(Some(ctx.node)),
        Some(arg) => Ok(node_set(arg, name)?.first().copied()),
    }
}

/// XPath rounding: halves go towards positive infinity
fn round(n: f64) -> f64 {
    if n.is_finite() {
        (n + 0.5).floor()
    } else {
        n
    }
}

/// 1-based, rounded positions; NaN bounds select nothing
fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    let first = round(start);
    let end = length.map_or(f64::INFINITY, |len| first + round(len));
    s.chars()
        .enumerate()
        .filter(|&(i, _)| {
            let position = (i + 1) as f64;
            position >= first && position < end
        })
        .map(|(_, c)| c)
        .collect()
}

fn translate(s: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

/// Nearest `xml:lang` on the context node or an ancestor, matched
/// case-insensitively, with subtags (`en` matches `en-US`).
fn lang<D: DocumentAccess>(ctx: &EvalContext<'_, D>, wanted: &str) -> bool {
    let wanted = wanted.to_lowercase();
    let mut node = Some(ctx.node.node_id());
    while let Some(id) = node {
        let found = ctx
            .doc
            .attributes(id)
            .iter()
            .find(|a| a.name.prefix == "xml" && a.name.local == "lang");
        if let Some(attr) = found {
            let lang = attr.value.to_lowercase();
            return lang == wanted
                || (lang.starts_with(&wanted) && lang.as_bytes().get(wanted.len()) == Some(&b'-'));
        }
        node = ctx.doc.parent_of(id);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;
    use crate::parser::parse_str;
    use crate::xpath::{compile, evaluate};

    fn eval_str(doc: &XmlDocument, xpath: &str) -> XPathValue {
        evaluate(doc, XmlDocument::DOCUMENT, &compile(xpath).unwrap()).unwrap()
    }

    fn string(xpath: &str) -> String {
        let doc = parse_str("<r/>").unwrap();
        match eval_str(&doc, xpath) {
            XPathValue::String(s) => s,
            other => panic!("not a string: {:?}", other),
        }
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(string("concat('hello', ' ', 'world')"), "hello world");
        assert_eq!(string("substring('hello', 2, 3)"), "ell");
        assert_eq!(string("substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(string("substring('12345', 0 div 0, 3)"), "");
        assert_eq!(string("substring-before('1999/04/01', '/')"), "1999");
        assert_eq!(string("substring-after('1999/04/01', '/')"), "04/01");
        assert_eq!(string("normalize-space('  hello   world  ')"), "hello world");
        assert_eq!(string("translate('bar', 'abc', 'ABC')"), "BAr");
        assert_eq!(string("translate('--aaa--', 'abc-', 'ABC')"), "AAA");
        assert_eq!(string("upper-case('abc')"), "ABC");
    }

    #[test]
    fn test_number_functions() {
        let doc = parse_str("<r><n>1</n><n>2.5</n></r>").unwrap();
        assert_eq!(eval_str(&doc, "sum(//n)"), XPathValue::Number(3.5));
        assert_eq!(eval_str(&doc, "round(2.5)"), XPathValue::Number(3.0));
        assert_eq!(eval_str(&doc, "round(-2.5)"), XPathValue::Number(-2.0));
        assert_eq!(eval_str(&doc, "floor(2.7)"), XPathValue::Number(2.0));
        assert_eq!(eval_str(&doc, "ceiling(2.1)"), XPathValue::Number(3.0));
        assert_eq!(eval_str(&doc, "number('12')"), XPathValue::Number(12.0));
        assert_eq!(eval_str(&doc, "count(//n)"), XPathValue::Number(2.0));
        assert_eq!(eval_str(&doc, "string-length(//n[2])"), XPathValue::Number(3.0));
    }

    #[test]
    fn test_name_functions() {
        let doc = parse_str(
            r#"<root xmlns:ns="http://example.com"><ns:child ns:a="1"/><?pi x?></root>"#,
        )
        .unwrap();
        assert_eq!(
            eval_str(&doc, "namespace-uri(//ns:child)"),
            XPathValue::String("http://example.com".to_string())
        );
        assert_eq!(eval_str(&doc, "name(//ns:child)"), XPathValue::String("ns:child".to_string()));
        assert_eq!(eval_str(&doc, "local-name(//ns:child)"), XPathValue::String("child".to_string()));
        assert_eq!(eval_str(&doc, "name(//@ns:a)"), XPathValue::String("ns:a".to_string()));
        assert_eq!(
            eval_str(&doc, "namespace-uri(//@ns:a)"),
            XPathValue::String("http://example.com".to_string())
        );
        assert_eq!(eval_str(&doc, "name(//processing-instruction())"), XPathValue::String("pi".to_string()));
        assert_eq!(eval_str(&doc, "local-name(/missing)"), XPathValue::String(String::new()));
    }

    #[test]
    fn test_lang() {
        let doc = parse_str(r#"<root xml:lang="en-US"><child/></root>"#).unwrap();
        assert!(eval_str(&doc, "//child[lang('en')]").to_boolean());
        assert!(!eval_str(&doc, "//child[lang('fr')]").to_boolean());
    }

    #[test]
    fn test_check_call() {
        assert!(check_call("concat", 5).is_ok());
        assert!(check_call("concat", 1).is_err());
        assert!(check_call("substring", 4).is_err());
        assert!(check_call("id", 1).is_err());
    }
}
