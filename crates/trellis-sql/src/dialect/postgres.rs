use super::{push_common_literal, Dialect};
use trellis_core::schema::BinaryFormat;
use trellis_core::{EngineFamily, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Postgres {
    fn push_string(&self, out: &mut String, s: &str) {
        out.push('\'');
        for c in s.chars() {
            if c == '\'' {
                out.push('\'');
            }
            out.push(c);
        }
        out.push('\'');
    }
}

impl Dialect for Postgres {
    fn family(&self) -> EngineFamily {
        EngineFamily::Postgres
    }

    fn push_ident(&self, out: &mut String, ident: &str) {
        out.push('"');
        for c in ident.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    }

    fn push_marker(&self, out: &mut String, n: usize) {
        out.push('$');
        out.push_str(&n.to_string());
    }

    fn push_literal(&self, out: &mut String, value: &Value) {
        if push_common_literal(out, value) {
            return;
        }
        match value {
            Value::String(s) => self.push_string(out, s),
            Value::Json(json) => {
                self.push_string(out, &json.to_string());
                out.push_str("::json");
            }
            _ => unreachable!("handled by push_common_literal"),
        }
    }

    fn json_object(&self, pairs: &[(String, String)]) -> String {
        let mut out = String::from("json_build_object(");
        push_pairs(self, &mut out, pairs);
        out.push(')');
        out
    }

    fn json_agg_objects(&self, pairs: &[(String, String)]) -> String {
        let mut out = String::from("coalesce(json_agg(jsonb_build_object(");
        push_pairs(self, &mut out, pairs);
        out.push_str(")), '[]'::json)");
        out
    }

    fn json_agg(&self, expr: &str) -> String {
        format!("coalesce(json_agg({expr}), '[]'::json)")
    }

    fn json_unnest(&self, expr: &str, alias: &str) -> String {
        format!("json_array_elements({expr}) AS {}", self.ident(alias))
    }

    fn json_unnest_element(&self, alias: &str) -> String {
        self.ident(alias)
    }

    fn utc_expr(&self, expr: &str) -> String {
        format!("{expr} AT TIME ZONE CURRENT_SETTING('timezone') AT TIME ZONE 'UTC'")
    }

    fn binary_expr(&self, expr: &str, format: BinaryFormat) -> String {
        match format {
            BinaryFormat::Hex => format!("encode({expr}, 'hex')"),
            BinaryFormat::Escape => format!("encode({expr}, 'escape')"),
        }
    }

    fn json_cast(&self, expr: &str) -> String {
        format!("CAST({expr} AS json)")
    }

    fn embeds_count(&self) -> bool {
        true
    }
}

fn push_pairs(dialect: &Postgres, out: &mut String, pairs: &[(String, String)]) {
    for (i, (title, expr)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        dialect.push_string(out, title);
        out.push_str(", ");
        out.push_str(expr);
    }
}
