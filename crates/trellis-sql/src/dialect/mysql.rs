use super::{push_common_literal, Dialect};
use trellis_core::schema::BinaryFormat;
use trellis_core::{EngineFamily, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct Mysql;

impl Mysql {
    fn push_string(&self, out: &mut String, s: &str) {
        out.push('\'');
        for c in s.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str(r"\\"),
                _ => out.push(c),
            }
        }
        out.push('\'');
    }
}

impl Dialect for Mysql {
    fn family(&self) -> EngineFamily {
        EngineFamily::Mysql
    }

    fn push_ident(&self, out: &mut String, ident: &str) {
        out.push('`');
        for c in ident.chars() {
            if c == '`' {
                out.push('`');
            }
            out.push(c);
        }
        out.push('`');
    }

    fn push_marker(&self, out: &mut String, _n: usize) {
        out.push('?');
    }

    fn push_literal(&self, out: &mut String, value: &Value) {
        if push_common_literal(out, value) {
            return;
        }
        match value {
            Value::String(s) => self.push_string(out, s),
            Value::Json(json) => {
                out.push_str("CAST(");
                self.push_string(out, &json.to_string());
                out.push_str(" AS JSON)");
            }
            _ => unreachable!("handled by push_common_literal"),
        }
    }

    fn json_object(&self, pairs: &[(String, String)]) -> String {
        let mut out = String::from("json_object(");
        push_pairs(self, &mut out, pairs);
        out.push(')');
        out
    }

    fn json_agg_objects(&self, pairs: &[(String, String)]) -> String {
        let mut out = String::from("coalesce(json_arrayagg(json_object(");
        push_pairs(self, &mut out, pairs);
        out.push_str(")), json_array())");
        out
    }

    fn json_agg(&self, expr: &str) -> String {
        format!("coalesce(json_arrayagg({expr}), json_array())")
    }

    fn json_unnest(&self, expr: &str, alias: &str) -> String {
        format!(
            "JSON_TABLE({expr}, '$[*]' COLUMNS (`v` JSON PATH '$')) AS {}",
            self.ident(alias)
        )
    }

    fn json_unnest_element(&self, alias: &str) -> String {
        self.qualified(alias, "v")
    }

    fn utc_expr(&self, expr: &str) -> String {
        format!("CONVERT_TZ({expr}, @@SESSION.time_zone, '+00:00')")
    }

    fn binary_expr(&self, expr: &str, format: BinaryFormat) -> String {
        match format {
            BinaryFormat::Hex => format!("HEX({expr})"),
            BinaryFormat::Escape => format!("TO_BASE64({expr})"),
        }
    }

    fn json_cast(&self, expr: &str) -> String {
        format!("CAST({expr} AS JSON)")
    }

    fn embeds_count(&self) -> bool {
        false
    }
}

fn push_pairs(dialect: &Mysql, out: &mut String, pairs: &[(String, String)]) {
    for (i, (title, expr)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        dialect.push_string(out, title);
        out.push_str(", ");
        out.push_str(expr);
    }
}
