// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Translation of liberty Boolean expressions into explicit and/or/invert
//! form.
//!
//! Liberty writes AND as juxtaposition (`A B`), NOT either prefix (`!A`) or
//! postfix (`A'`), and allows `^` for XOR. Mapping tools want every operator
//! spelled out, so the translator rewrites the expression in three passes:
//! XOR elimination, explicit `*` insertion, and postfix-quote normalization.
//! The result is attached to a cell as `"<output> = <expr>;"`.

/// Character class driving explicit-AND insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Init,
    GroupBegin,
    GroupEnd,
    Signal,
    Operator,
    Separator,
}

/// Translate one liberty function expression for the named output pin.
///
/// Pure: the same inputs always produce the same string.
pub fn translate_function(out_name: &str, lib_expr: &str) -> String {
    let expanded = expand_xor(lib_expr);
    let explicit = insert_explicit_and(&expanded);
    let normalized = normalize_postfix_not(&explicit);
    format!("{} = {};", out_name, normalized)
}

/// Span of the operand to the right of an XOR at byte `xpos` (exclusive of
/// surrounding whitespace): a balanced parenthesized group if one starts
/// there, otherwise the maximal run up to a space, `)` or end of string.
fn xor_rhs_span(bytes: &[u8], xpos: usize) -> (usize, usize) {
    let mut start = xpos + 1;
    while start < bytes.len() && matches!(bytes[start], b' ' | b'\t') {
        start += 1;
    }
    if start < bytes.len() && bytes[start] == b'(' {
        let mut nest = 0usize;
        let mut p = start;
        while p < bytes.len() {
            match bytes[p] {
                b'(' => nest += 1,
                b')' => {
                    nest -= 1;
                    if nest == 0 {
                        return (start, p + 1);
                    }
                }
                _ => {}
            }
            p += 1;
        }
        (start, bytes.len())
    } else {
        let mut p = start;
        while p < bytes.len() && !matches!(bytes[p], b' ' | b'\t' | b')') {
            p += 1;
        }
        (start, p)
    }
}

/// Span of the operand to the left of an XOR at byte `xpos`, symmetric to
/// [`xor_rhs_span`].
fn xor_lhs_span(bytes: &[u8], xpos: usize) -> (usize, usize) {
    let mut end = xpos;
    while end > 0 && matches!(bytes[end - 1], b' ' | b'\t') {
        end -= 1;
    }
    if end > 0 && bytes[end - 1] == b')' {
        let mut nest = 0usize;
        let mut p = end;
        while p > 0 {
            p -= 1;
            match bytes[p] {
                b')' => nest += 1,
                b'(' => {
                    nest -= 1;
                    if nest == 0 {
                        return (p, end);
                    }
                }
                _ => {}
            }
        }
        (0, end)
    } else {
        let mut p = end;
        while p > 0 && !matches!(bytes[p - 1], b' ' | b'\t' | b'(') {
            p -= 1;
        }
        (p, end)
    }
}

/// An extracted operand as it may be spliced into the `{lhs}*!{rhs}`
/// products: a single token or one balanced group keeps its meaning next to
/// `*` and `!`, while a run with a bare `*` or `+` inside (`A*B`, `A+B`)
/// must be parenthesized first.
fn xor_operand(span: &str) -> String {
    let bytes = span.as_bytes();
    if bytes.first() == Some(&b'(') {
        let mut nest = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'(' => nest += 1,
                b')' => {
                    nest -= 1;
                    if nest == 0 {
                        return if i == bytes.len() - 1 {
                            span.to_string()
                        } else {
                            format!("({})", span)
                        };
                    }
                }
                _ => {}
            }
        }
        // Unterminated group, taken as-is.
        return span.to_string();
    }
    if span.contains(|c: char| c == '*' || c == '+') {
        format!("({})", span)
    } else {
        span.to_string()
    }
}

/// Rewrite every `LHS ^ RHS` as `(LHS*!RHS + !LHS*RHS)`, rescanning from the
/// start after each rewrite until no `^` remains. Operands are wrapped in
/// parentheses by [`xor_operand`] where splicing would change their meaning.
fn expand_xor(expr: &str) -> String {
    let mut s = expr.to_string();
    while let Some(xpos) = s.find('^') {
        let bytes = s.as_bytes();
        let (lstart, lend) = xor_lhs_span(bytes, xpos);
        let (rstart, rend) = xor_rhs_span(bytes, xpos);
        let lhs = xor_operand(&s[lstart..lend]);
        let rhs = xor_operand(&s[rstart..rend]);
        let rewritten = format!(
            "{}({}*!{} + !{}*{}){}",
            &s[..lstart],
            lhs,
            rhs,
            lhs,
            rhs,
            &s[rend..]
        );
        s = rewritten;
    }
    s
}

/// Insert `*` wherever juxtaposition implied AND: before `(` following a
/// signal, group close or separator, and before a signal character following
/// a group close or separator.
fn insert_explicit_and(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len() * 2);
    let mut state = CharClass::Init;
    for c in expr.chars() {
        match c {
            '(' => {
                if matches!(
                    state,
                    CharClass::Signal | CharClass::GroupEnd | CharClass::Separator
                ) {
                    push_and(&mut out);
                }
                state = CharClass::GroupBegin;
                out.push(c);
            }
            ')' => {
                state = CharClass::GroupEnd;
                out.push(c);
            }
            '!' | '*' | '+' | '\'' => {
                state = CharClass::Operator;
                out.push(c);
            }
            ' ' | '\t' => {
                if state == CharClass::Signal {
                    state = CharClass::Separator;
                }
                out.push(c);
            }
            _ => {
                if matches!(state, CharClass::Separator | CharClass::GroupEnd) {
                    push_and(&mut out);
                }
                state = CharClass::Signal;
                out.push(c);
            }
        }
    }
    out
}

fn push_and(out: &mut String) {
    if !out.ends_with(|c: char| c == ' ' || c == '\t') {
        out.push(' ');
    }
    out.push_str("* ");
}

/// Rewrite every postfix `'` as a prefix `!` on the operand it negates: the
/// matching balanced group when the quote follows `)`, otherwise the longest
/// trailing run of non-operator, non-whitespace, non-parenthesis characters.
fn normalize_postfix_not(expr: &str) -> String {
    let mut s = expr.to_string();
    while let Some(qpos) = s.find('\'') {
        let bytes = s.as_bytes();
        let mut end = qpos;
        while end > 0 && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        let start = if end > 0 && bytes[end - 1] == b')' {
            let mut nest = 0usize;
            let mut p = end;
            let mut group_start = 0;
            while p > 0 {
                p -= 1;
                match bytes[p] {
                    b')' => nest += 1,
                    b'(' => {
                        nest -= 1;
                        if nest == 0 {
                            group_start = p;
                            break;
                        }
                    }
                    _ => {}
                }
            }
            group_start
        } else {
            let mut p = end;
            while p > 0 {
                let b = bytes[p - 1];
                if matches!(b, b'!' | b'*' | b'+' | b'(' | b')') || b.is_ascii_whitespace() {
                    break;
                }
                p -= 1;
            }
            p
        };
        let mut rewritten = String::with_capacity(s.len());
        rewritten.push_str(&s[..start]);
        rewritten.push('!');
        rewritten.push_str(&s[start..qpos]);
        rewritten.push_str(&s[qpos + 1..]);
        s = rewritten;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_of_two_signals() {
        assert_eq!(expand_xor("A ^ B"), "(A*!B + !A*B)");
    }

    #[test]
    fn xor_with_grouped_operand() {
        assert_eq!(expand_xor("(A+B) ^ C"), "((A+B)*!C + !(A+B)*C)");
    }

    #[test]
    fn xor_without_spaces() {
        assert_eq!(expand_xor("A^B"), "(A*!B + !A*B)");
    }

    #[test]
    fn unspaced_product_operand_gets_grouped() {
        assert_eq!(expand_xor("A*B ^ C"), "((A*B)*!C + !(A*B)*C)");
        assert_eq!(expand_xor("A ^ B*C"), "(A*!(B*C) + !A*(B*C))");
    }

    #[test]
    fn unspaced_sum_operand_gets_grouped() {
        assert_eq!(expand_xor("A+B ^ C"), "((A+B)*!C + !(A+B)*C)");
    }

    #[test]
    fn nested_xor_reaches_fixpoint() {
        assert_eq!(
            expand_xor("(A ^ B) ^ C"),
            "(((A*!B + !A*B))*!C + !((A*!B + !A*B))*C)"
        );
    }

    #[test]
    fn juxtaposition_becomes_and() {
        assert_eq!(insert_explicit_and("A B"), "A * B");
    }

    #[test]
    fn group_after_signal_becomes_and() {
        assert_eq!(insert_explicit_and("A(B+C)"), "A * (B+C)");
        assert_eq!(insert_explicit_and("A (B+C)"), "A * (B+C)");
    }

    #[test]
    fn signal_after_group_becomes_and() {
        assert_eq!(insert_explicit_and("(A+B)C"), "(A+B) * C");
    }

    #[test]
    fn multichar_names_stay_one_token() {
        assert_eq!(insert_explicit_and("A1 B2"), "A1 * B2");
    }

    #[test]
    fn explicit_operators_left_alone() {
        assert_eq!(insert_explicit_and("A + !B * C"), "A + !B * C");
    }

    #[test]
    fn postfix_quote_on_signal() {
        assert_eq!(normalize_postfix_not("A'"), "!A");
        assert_eq!(normalize_postfix_not("A + B'"), "A + !B");
    }

    #[test]
    fn postfix_quote_on_group() {
        assert_eq!(normalize_postfix_not("(A+B)'"), "!(A+B)");
    }

    #[test]
    fn postfix_quote_on_multichar_signal() {
        assert_eq!(normalize_postfix_not("A1' B"), "!A1 B");
    }

    #[test]
    fn repeated_quotes_all_normalize() {
        assert_eq!(normalize_postfix_not("A' + B'"), "!A + !B");
    }

    #[test]
    fn full_translation_of_nand() {
        assert_eq!(translate_function("Y", "(A B)'"), "Y = !(A * B);");
    }

    #[test]
    fn full_translation_of_xor() {
        assert_eq!(translate_function("Y", "A ^ B"), "Y = (A*!B + !A*B);");
    }

    #[test]
    fn full_translation_of_xor_with_product_operand() {
        // (A*B) xor C: at A=1, B=0 the output follows C.
        assert_eq!(
            translate_function("Y", "A*B ^ C"),
            "Y = ((A*B)*!C + !(A*B)*C);"
        );
    }

    #[test]
    fn full_translation_is_pure() {
        let a = translate_function("Z", "A (B + C')");
        let b = translate_function("Z", "A (B + C')");
        assert_eq!(a, b);
        assert_eq!(a, "Z = A * (B + !C);");
    }
}
