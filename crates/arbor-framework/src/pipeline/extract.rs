//! Reading routing keys, arguments and modal values out of an interaction.

use std::collections::HashMap;

use serde_json::{Map, Value};

use arbor_core::{CommandDataOption, Interaction, ModalComponent, OptionType};

use crate::router::join_path;

/// The dot-joined routing key of a command or autocomplete invocation.
///
/// An invocation carries at most one subcommand group followed by at most
/// one subcommand, so the walk is two levels deep at most.
pub fn command_path(interaction: &Interaction) -> Option<String> {
    let mut path = interaction.data.name.clone()?;

    let Some(first) = interaction.data.options.first() else {
        return Some(path);
    };
    match first.kind {
        OptionType::SubCommandGroup => {
            path = join_path(&path, &first.name);
            if let Some(sub) = first
                .options
                .first()
                .filter(|option| option.kind == OptionType::SubCommand)
            {
                path = join_path(&path, &sub.name);
            }
        }
        OptionType::SubCommand => path = join_path(&path, &first.name),
        _ => {}
    }

    Some(path)
}

/// The option the user is typing into, searched depth-first.
pub fn focused_option(options: &[CommandDataOption]) -> Option<&CommandDataOption> {
    let mut stack: Vec<&CommandDataOption> = options.iter().rev().collect();
    while let Some(option) = stack.pop() {
        if option.focused {
            return Some(option);
        }
        stack.extend(option.options.iter().rev());
    }
    None
}

/// Invocation options as a JSON object.
///
/// Groups and subcommands nest: `/mod config set key:a` yields
/// `{"config": {"set": {"key": "a"}}}`.
pub fn parse_args(options: &[CommandDataOption]) -> Value {
    let mut args = Map::new();
    for option in options {
        let value = if option.kind.is_routable() {
            parse_args(&option.options)
        } else {
            option.value.clone().unwrap_or(Value::Null)
        };
        args.insert(option.name.clone(), value);
    }
    Value::Object(args)
}

/// Every submitted text value in a modal, at any depth.
///
/// Inputs without a custom id are keyed `id-<numeric id>`.
pub fn parse_modal(components: &[ModalComponent]) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut worklist: Vec<&ModalComponent> = components.iter().collect();

    while let Some(component) = worklist.pop() {
        if let Some(value) = &component.value {
            let key = match (&component.custom_id, component.id) {
                (Some(custom_id), _) => custom_id.clone(),
                (None, Some(id)) => format!("id-{id}"),
                (None, None) => continue,
            };
            values.insert(key, value.clone());
        }
        if let Some(child) = &component.component {
            worklist.push(child);
        }
        worklist.extend(component.components.iter());
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::Snowflake;
    use serde_json::json;

    fn invoke(name: &str, options: Vec<CommandDataOption>) -> Interaction {
        Interaction::command(Snowflake(1), Snowflake(2), name, options)
    }

    #[test]
    fn test_command_path_depths() {
        assert_eq!(command_path(&invoke("ping", vec![])).unwrap(), "ping");

        let plain = invoke(
            "echo",
            vec![CommandDataOption::value(OptionType::String, "text", json!("hi"))],
        );
        assert_eq!(command_path(&plain).unwrap(), "echo");

        let sub = invoke(
            "ping",
            vec![CommandDataOption::nested(OptionType::SubCommand, "check", vec![])],
        );
        assert_eq!(command_path(&sub).unwrap(), "ping.check");

        let group = invoke(
            "mod",
            vec![CommandDataOption::nested(
                OptionType::SubCommandGroup,
                "config",
                vec![CommandDataOption::nested(OptionType::SubCommand, "set", vec![])],
            )],
        );
        assert_eq!(command_path(&group).unwrap(), "mod.config.set");
    }

    #[test]
    fn test_command_path_requires_a_name() {
        let mut interaction = invoke("ping", vec![]);
        interaction.data.name = None;
        assert!(command_path(&interaction).is_none());
    }

    #[test]
    fn test_args_nest_under_routable_options() {
        let options = vec![CommandDataOption::nested(
            OptionType::SubCommandGroup,
            "config",
            vec![CommandDataOption::nested(
                OptionType::SubCommand,
                "set",
                vec![
                    CommandDataOption::value(OptionType::String, "key", json!("prefix")),
                    CommandDataOption::value(OptionType::Integer, "ttl", json!(30)),
                ],
            )],
        )];

        assert_eq!(
            parse_args(&options),
            json!({ "config": { "set": { "key": "prefix", "ttl": 30 } } })
        );
    }

    #[test]
    fn test_focused_option_is_found_in_nested_options() {
        let options = vec![CommandDataOption::nested(
            OptionType::SubCommand,
            "show",
            vec![
                CommandDataOption::value(OptionType::Integer, "page", json!(1)),
                CommandDataOption::value(OptionType::String, "name", json!("ru")).focused(),
            ],
        )];

        assert_eq!(focused_option(&options).unwrap().name, "name");
        assert!(focused_option(&options[0].options[..1]).is_none());
    }

    #[test]
    fn test_modal_values_are_flattened() {
        let components: Vec<ModalComponent> = serde_json::from_value(json!([
            { "type": 1, "components": [
                { "type": 4, "custom_id": "title", "value": "Hello" }
            ]},
            { "type": 18, "component": { "type": 4, "id": 7, "value": "World" } },
            { "type": 18, "components": [
                { "type": 4, "custom_id": "note", "value": "" }
            ]},
            { "type": 10, "id": 9 }
        ]))
        .unwrap();

        let values = parse_modal(&components);
        assert_eq!(values.len(), 3);
        assert_eq!(values["title"], "Hello");
        assert_eq!(values["id-7"], "World");
        assert_eq!(values["note"], "");
    }
}
