//! Argument tokenizer and binder.
//!
//! Binding scans tokens left to right:
//!
//! - A token starting with `-` whose second character is not a digit is a flag
//!   candidate (`-5` is a value). It is matched exactly against `--canonical-name`
//!   and aliases first, then case-insensitively.
//! - Switches consume nothing. Params arrays consume tokens up to the next flag
//!   candidate. Everything else consumes exactly one following token.
//! - Other tokens fill positional parameters in order; a params positional soaks
//!   up every remaining non-flag token.
//!
//! Unmatched parameters fall back to their default, or fail if they require
//! explicit binding.

use std::sync::Arc;

use crate::coerce::coerce;
use crate::error::DispatchError;
use crate::provider::ValidationProvider;
use crate::schema::{CommandSchema, ParameterSpec};
use crate::value::{Argument, BoundInvocation, Value};

/// Whether `token` should be treated as an option name.
pub fn is_flag_candidate(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some('-'), Some(second)) => !second.is_ascii_digit(),
        _ => false,
    }
}

/// Bind `args` (the tokens after the command path) against `schema`.
pub fn bind(schema: &Arc<CommandSchema>, args: &[String]) -> Result<BoundInvocation, DispatchError> {
    let params = schema.parameters();
    let positional: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_positional())
        .map(|(i, _)| i)
        .collect();

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    let mut cursor = 0;
    let mut i = 0;

    while i < args.len() {
        let token = &args[i];

        if is_flag_candidate(token) {
            let index =
                find_flag(params, token).ok_or_else(|| DispatchError::UnknownOption(token.clone()))?;
            let param = &params[index];

            if param.param_type().is_switch() {
                slots[index] = Some(Value::Bool(true));
                i += 1;
                continue;
            }

            if param.is_params_array() {
                i += 1;
                let start = i;
                while i < args.len() && !is_flag_candidate(&args[i]) {
                    i += 1;
                }
                append_elements(&mut slots[index], param, token, &args[start..i])?;
                continue;
            }

            let raw = args.get(i + 1).ok_or_else(|| {
                DispatchError::parse_failed(token.as_str(), "", "A value is required.")
            })?;
            slots[index] = Some(coerce_param(param, token, raw)?);
            i += 2;
            continue;
        }

        let index = *positional
            .get(cursor)
            .ok_or_else(|| DispatchError::UnknownOption(token.clone()))?;
        let param = &params[index];

        if param.is_params_array() {
            let name = param.display_name();
            append_elements(&mut slots[index], param, &name, std::slice::from_ref(token))?;
        } else {
            slots[index] = Some(coerce_param(param, &param.display_name(), token)?);
            cursor += 1;
        }
        i += 1;
    }

    let arguments = params
        .iter()
        .zip(slots)
        .map(|(param, slot)| finish(param, slot))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::trace!(command = %schema.name(), ?arguments, "Arguments bound");
    Ok(BoundInvocation::new(Arc::clone(schema), arguments))
}

/// Run attached validators; aggregate every failure.
pub fn validate(
    bound: &BoundInvocation,
    validator: &dyn ValidationProvider,
) -> Result<(), DispatchError> {
    let messages: Vec<String> = bound
        .iter()
        .filter(|(param, _)| param.has_validation())
        .filter_map(|(param, arg)| arg.as_value().map(|value| (param, value)))
        .flat_map(|(param, value)| validator.validate(param, value))
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::ValidationFailed(messages))
    }
}

fn find_flag(params: &[ParameterSpec], token: &str) -> Option<usize> {
    params
        .iter()
        .position(|p| p.flag_names().any(|name| name == token))
        .or_else(|| {
            params
                .iter()
                .position(|p| p.flag_names().any(|name| name.eq_ignore_ascii_case(token)))
        })
}

fn coerce_param(param: &ParameterSpec, name: &str, raw: &str) -> Result<Value, DispatchError> {
    coerce(param.param_type(), raw).map_err(|reason| DispatchError::parse_failed(name, raw, reason))
}

fn append_elements(
    slot: &mut Option<Value>,
    param: &ParameterSpec,
    name: &str,
    tokens: &[String],
) -> Result<(), DispatchError> {
    let elem = param
        .param_type()
        .element()
        .ok_or_else(|| DispatchError::parse_failed(name, "", "Params parameter is not an array."))?;

    let mut items = match slot.take() {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    for token in tokens {
        let value =
            coerce(elem, token).map_err(|reason| DispatchError::parse_failed(name, token, reason))?;
        items.push(value);
    }
    *slot = Some(Value::Array(items));
    Ok(())
}

fn finish(param: &ParameterSpec, slot: Option<Value>) -> Result<Argument, DispatchError> {
    if param.is_injected() {
        return Ok(Argument::Unresolved);
    }
    if let Some(value) = slot {
        return Ok(Argument::Value(value));
    }
    if param.requires_explicit_binding() {
        return Err(DispatchError::RequiredArgumentMissing(param.display_name()));
    }
    let value = param
        .default_value()
        .cloned()
        .unwrap_or_else(|| Value::zero(param.param_type()));
    Ok(Argument::Value(value))
}
