use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::ArgumentValue;
use crate::CompiledField;
use crate::CompiledFragment;
use crate::CompiledSelection;
use crate::FieldValue;
use crate::Operation;
use crate::Record;

pub fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn character_fields() -> Vec<CompiledSelection> {
    vec![
        CompiledField::new("__typename").into(),
        CompiledField::new("id").into(),
        CompiledField::new("name").into(),
    ]
}

/// ```graphql
/// query HeroAndFriends($episode: Episode) {
///   hero(episode: $episode) { __typename id name friends { __typename id name } }
/// }
/// ```
pub fn hero_and_friends_query(episode: &str) -> Operation {
    let mut hero_fields = character_fields();
    hero_fields.push(CompiledField::new("friends").selections(character_fields()).into());

    Operation::query("HeroAndFriends", "query HeroAndFriends($episode: Episode) { ... }")
        .selections([CompiledField::new("hero")
            .argument("episode", ArgumentValue::variable("episode"))
            .selections(hero_fields)])
        .variable("episode", episode)
}

pub fn hero_and_friends_data() -> Map<String, Value> {
    json_object(json!({
        "hero": {
            "__typename": "Droid",
            "id": "2001",
            "name": "R2-D2",
            "friends": [
                { "__typename": "Human", "id": "1000", "name": "Luke Skywalker" },
                { "__typename": "Human", "id": "1002", "name": "Han Solo" }
            ]
        }
    }))
}

/// ```graphql
/// query Character($id: ID!) { character(id: $id) { __typename id name } }
/// ```
pub fn character_query(id: &str) -> Operation {
    Operation::query("Character", "query Character($id: ID!) { ... }")
        .selections([CompiledField::new("character")
            .argument("id", ArgumentValue::variable("id"))
            .selections(character_fields())])
        .variable("id", id)
}

pub fn character_data(
    id: &str,
    typename: &str,
    name: &str,
) -> Map<String, Value> {
    json_object(json!({
        "character": { "__typename": typename, "id": id, "name": name }
    }))
}

/// ```graphql
/// query HeroDetails { hero { __typename name ... on Human { height } ... on Droid { primaryFunction } } }
/// ```
pub fn hero_details_query() -> Operation {
    Operation::query("HeroDetails", "query HeroDetails { ... }").selections([CompiledField::new(
        "hero",
    )
    .selections::<_, CompiledSelection>([
        CompiledField::new("__typename").into(),
        CompiledField::new("name").into(),
        CompiledFragment::new("Human")
            .selections([CompiledField::new("height")])
            .into(),
        CompiledFragment::new("Droid")
            .selections([CompiledField::new("primaryFunction")])
            .into(),
    ])])
}

/// ```graphql
/// mutation UpdateName($id: ID!, $name: String!) { updateName(id: $id, name: $name) { __typename id name } }
/// ```
pub fn update_name_mutation(
    id: &str,
    name: &str,
) -> Operation {
    Operation::mutation("UpdateName", "mutation UpdateName($id: ID!, $name: String!) { ... }")
        .selections([CompiledField::new("updateName")
            .argument("id", ArgumentValue::variable("id"))
            .argument("name", ArgumentValue::variable("name"))
            .selections(character_fields())])
        .variable("id", id)
        .variable("name", name)
}

pub fn update_name_data(
    id: &str,
    name: &str,
) -> Map<String, Value> {
    json_object(json!({
        "updateName": { "__typename": "Human", "id": id, "name": name }
    }))
}

/// R2-D2 with two friends, Luke and Han
pub fn r2d2_records() -> Vec<Record> {
    vec![
        Record::with_fields(
            "2001",
            [
                ("__typename", FieldValue::scalar("Droid")),
                ("name", FieldValue::scalar("R2-D2")),
                (
                    "friends",
                    FieldValue::List(vec![
                        FieldValue::reference("1000"),
                        FieldValue::reference("1002"),
                    ]),
                ),
            ],
        ),
        Record::with_fields(
            "1000",
            [
                ("__typename", FieldValue::scalar("Human")),
                ("name", FieldValue::scalar("Luke Skywalker")),
            ],
        ),
        Record::with_fields(
            "1002",
            [
                ("__typename", FieldValue::scalar("Human")),
                ("name", FieldValue::scalar("Han Solo")),
            ],
        ),
    ]
}

/// `{ friends { name } }`
pub fn friends_names_selection() -> Vec<CompiledSelection> {
    vec![CompiledField::new("friends")
        .selections([CompiledField::new("name")])
        .into()]
}
