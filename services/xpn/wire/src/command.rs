//! Catalog of outbound commands understood by the remote controller.
//!
//! One variant per supported remote action. Each command knows how to
//! render itself into the wire envelope; the encoder in `xpn-session`
//! registers one bus handler per [`CommandKind`] and does nothing else.

use crate::correlation::CorrelationId;
use crate::envelope::Envelope;
use serde_json::json;

/// Take-item category name on the wire
const CATEGORY_TAKEITEM: &str = "takeitem";
/// Widget category name on the wire
const CATEGORY_WIDGET: &str = "widget";

/// An outbound command plus its parameters.
///
/// `uuid` is the correlation token echoed back in the matching reply; it
/// may be left empty for fire-and-forget use.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start the remote controller's main engine
    Start {
        /// Correlation token
        uuid: Option<CorrelationId>,
    },
    /// Query a take item's online status
    GetTakeItemStatus {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Take item id
        take_id: i64,
    },
    /// Put a take item on air
    SetTakeItemOnline {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Take item id
        take_id: i64,
    },
    /// Take a take item off air
    SetTakeItemOffline {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Take item id
        take_id: i64,
    },
    /// Edit a text or material property of a take item
    EditTakeItemProperty {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Take item id
        take_id: i64,
        /// Scene object to edit
        obj_name: String,
        /// New value
        value: String,
        /// Property name, when not the default text property
        prop_name: Option<String>,
        /// Optional material/texture reference
        material: Option<String>,
    },
    /// Query the layer a take item renders on
    GetTakeItemLayer {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Take item id
        take_id: i64,
    },
    /// Read a counter widget's value
    GetCounterWidgetValue {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
    },
    /// Set a counter widget's value
    EditCounterWidget {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
        /// New value
        value: i64,
    },
    /// Increment a counter widget
    IncreaseCounterWidget {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
        /// Step size
        increment: i64,
    },
    /// Decrement a counter widget
    DecreaseCounterWidget {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
        /// Step size
        decrement: i64,
    },
    /// Read all values of a text-list widget
    GetTextListWidgetValues {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
    },
    /// Read the selected index of a text-list widget
    GetTextListWidgetItemIndex {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
    },
    /// Replace the value at the selected index of a text-list widget
    SetTextListWidgetValue {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
        /// New value
        value: String,
    },
    /// Replace all values of a text-list widget
    SetTextListWidgetValues {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
        /// New values
        values: Vec<String>,
    },
    /// Select an index in a text-list widget
    SetTextListWidgetItemIndex {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Widget name
        name: String,
        /// Index to select
        index: i64,
    },
    /// Join a named sub-service
    Join {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Sub-service name
        name: String,
    },
    /// Leave a named sub-service
    Leave {
        /// Correlation token
        uuid: Option<CorrelationId>,
        /// Sub-service name
        name: String,
    },
}

/// Fieldless discriminant of [`Command`], used as the bus topic key for
/// encoder registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CommandKind {
    Start,
    GetTakeItemStatus,
    SetTakeItemOnline,
    SetTakeItemOffline,
    EditTakeItemProperty,
    GetTakeItemLayer,
    GetCounterWidgetValue,
    EditCounterWidget,
    IncreaseCounterWidget,
    DecreaseCounterWidget,
    GetTextListWidgetValues,
    GetTextListWidgetItemIndex,
    SetTextListWidgetValue,
    SetTextListWidgetValues,
    SetTextListWidgetItemIndex,
    Join,
    Leave,
}

impl CommandKind {
    /// Every supported command, in catalog order
    pub const ALL: [CommandKind; 17] = [
        CommandKind::Start,
        CommandKind::GetTakeItemStatus,
        CommandKind::SetTakeItemOnline,
        CommandKind::SetTakeItemOffline,
        CommandKind::EditTakeItemProperty,
        CommandKind::GetTakeItemLayer,
        CommandKind::GetCounterWidgetValue,
        CommandKind::EditCounterWidget,
        CommandKind::IncreaseCounterWidget,
        CommandKind::DecreaseCounterWidget,
        CommandKind::GetTextListWidgetValues,
        CommandKind::GetTextListWidgetItemIndex,
        CommandKind::SetTextListWidgetValue,
        CommandKind::SetTextListWidgetValues,
        CommandKind::SetTextListWidgetItemIndex,
        CommandKind::Join,
        CommandKind::Leave,
    ];
}

impl Command {
    /// Discriminant of this command
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Start { .. } => CommandKind::Start,
            Command::GetTakeItemStatus { .. } => CommandKind::GetTakeItemStatus,
            Command::SetTakeItemOnline { .. } => CommandKind::SetTakeItemOnline,
            Command::SetTakeItemOffline { .. } => CommandKind::SetTakeItemOffline,
            Command::EditTakeItemProperty { .. } => CommandKind::EditTakeItemProperty,
            Command::GetTakeItemLayer { .. } => CommandKind::GetTakeItemLayer,
            Command::GetCounterWidgetValue { .. } => CommandKind::GetCounterWidgetValue,
            Command::EditCounterWidget { .. } => CommandKind::EditCounterWidget,
            Command::IncreaseCounterWidget { .. } => CommandKind::IncreaseCounterWidget,
            Command::DecreaseCounterWidget { .. } => CommandKind::DecreaseCounterWidget,
            Command::GetTextListWidgetValues { .. } => CommandKind::GetTextListWidgetValues,
            Command::GetTextListWidgetItemIndex { .. } => CommandKind::GetTextListWidgetItemIndex,
            Command::SetTextListWidgetValue { .. } => CommandKind::SetTextListWidgetValue,
            Command::SetTextListWidgetValues { .. } => CommandKind::SetTextListWidgetValues,
            Command::SetTextListWidgetItemIndex { .. } => CommandKind::SetTextListWidgetItemIndex,
            Command::Join { .. } => CommandKind::Join,
            Command::Leave { .. } => CommandKind::Leave,
        }
    }

    /// The correlation token this command carries, if any
    pub fn uuid(&self) -> Option<&CorrelationId> {
        match self {
            Command::Start { uuid }
            | Command::GetTakeItemStatus { uuid, .. }
            | Command::SetTakeItemOnline { uuid, .. }
            | Command::SetTakeItemOffline { uuid, .. }
            | Command::EditTakeItemProperty { uuid, .. }
            | Command::GetTakeItemLayer { uuid, .. }
            | Command::GetCounterWidgetValue { uuid, .. }
            | Command::EditCounterWidget { uuid, .. }
            | Command::IncreaseCounterWidget { uuid, .. }
            | Command::DecreaseCounterWidget { uuid, .. }
            | Command::GetTextListWidgetValues { uuid, .. }
            | Command::GetTextListWidgetItemIndex { uuid, .. }
            | Command::SetTextListWidgetValue { uuid, .. }
            | Command::SetTextListWidgetValues { uuid, .. }
            | Command::SetTextListWidgetItemIndex { uuid, .. }
            | Command::Join { uuid, .. }
            | Command::Leave { uuid, .. } => uuid.as_ref(),
        }
    }

    /// Stamp a correlation token onto this command
    pub fn set_uuid(&mut self, id: CorrelationId) {
        match self {
            Command::Start { uuid }
            | Command::GetTakeItemStatus { uuid, .. }
            | Command::SetTakeItemOnline { uuid, .. }
            | Command::SetTakeItemOffline { uuid, .. }
            | Command::EditTakeItemProperty { uuid, .. }
            | Command::GetTakeItemLayer { uuid, .. }
            | Command::GetCounterWidgetValue { uuid, .. }
            | Command::EditCounterWidget { uuid, .. }
            | Command::IncreaseCounterWidget { uuid, .. }
            | Command::DecreaseCounterWidget { uuid, .. }
            | Command::GetTextListWidgetValues { uuid, .. }
            | Command::GetTextListWidgetItemIndex { uuid, .. }
            | Command::SetTextListWidgetValue { uuid, .. }
            | Command::SetTextListWidgetValues { uuid, .. }
            | Command::SetTextListWidgetItemIndex { uuid, .. }
            | Command::Join { uuid, .. }
            | Command::Leave { uuid, .. } => *uuid = Some(id),
        }
    }

    /// Render this command into its wire envelope
    pub fn into_envelope(self) -> Envelope {
        match self {
            Command::Start { uuid } => {
                Envelope::command(Some("main"), "start", json!({ "uuid": uuid }))
            }
            Command::GetTakeItemStatus { uuid, take_id } => Envelope::command(
                Some(CATEGORY_TAKEITEM),
                "GetTakeItemStatus",
                json!({ "uuid": uuid, "takeID": take_id }),
            ),
            Command::SetTakeItemOnline { uuid, take_id } => Envelope::command(
                Some(CATEGORY_TAKEITEM),
                "SetTakeItemOnline",
                json!({ "uuid": uuid, "takeID": take_id }),
            ),
            Command::SetTakeItemOffline { uuid, take_id } => Envelope::command(
                Some(CATEGORY_TAKEITEM),
                "SetTakeItemOffline",
                json!({ "uuid": uuid, "takeID": take_id }),
            ),
            Command::EditTakeItemProperty {
                uuid,
                take_id,
                obj_name,
                value,
                prop_name,
                material,
            } => {
                let mut properties = json!({
                    "uuid": uuid,
                    "takeID": take_id,
                    "objName": obj_name,
                    "value": value,
                    "propName": prop_name,
                });
                if let Some(material) = material {
                    properties["material"] = json!(material);
                }
                Envelope::command(Some(CATEGORY_TAKEITEM), "EditTakeItemProperty", properties)
            }
            Command::GetTakeItemLayer { uuid, take_id } => Envelope::command(
                Some(CATEGORY_TAKEITEM),
                "GetTakeItemLayer",
                json!({ "uuid": uuid, "takeID": take_id }),
            ),
            Command::GetCounterWidgetValue { uuid, name } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "GetCounterWidgetValue",
                json!({ "uuid": uuid, "name": name }),
            ),
            Command::EditCounterWidget { uuid, name, value } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "EditCounterWidget",
                json!({ "uuid": uuid, "name": name, "value": value }),
            ),
            Command::IncreaseCounterWidget {
                uuid,
                name,
                increment,
            } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "IncreaseCounterWidget",
                json!({ "uuid": uuid, "name": name, "increment": increment }),
            ),
            Command::DecreaseCounterWidget {
                uuid,
                name,
                decrement,
            } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "DecreaseCounterWidget",
                json!({ "uuid": uuid, "name": name, "decrement": decrement }),
            ),
            Command::GetTextListWidgetValues { uuid, name } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "GetTextListWidgetValues",
                json!({ "uuid": uuid, "name": name }),
            ),
            Command::GetTextListWidgetItemIndex { uuid, name } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "GetTextListWidgetItemIndex",
                json!({ "uuid": uuid, "name": name }),
            ),
            Command::SetTextListWidgetValue { uuid, name, value } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "SetTextListWidgetValue",
                json!({ "uuid": uuid, "name": name, "value": value }),
            ),
            Command::SetTextListWidgetValues { uuid, name, values } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "SetTextListWidgetValues",
                json!({ "uuid": uuid, "name": name, "values": values }),
            ),
            Command::SetTextListWidgetItemIndex { uuid, name, index } => Envelope::command(
                Some(CATEGORY_WIDGET),
                "SetTextListWidgetItemIndex",
                json!({ "uuid": uuid, "name": name, "index": index }),
            ),
            Command::Join { uuid, name } => {
                Envelope::membership("join", json!({ "uuid": uuid, "name": name }))
            }
            Command::Leave { uuid, name } => {
                Envelope::membership("leave", json!({ "uuid": uuid, "name": name }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_edit_take_item_property_envelope() {
        let cmd = Command::EditTakeItemProperty {
            uuid: Some(CorrelationId::from("id-1")),
            take_id: 2,
            obj_name: "txtName".to_string(),
            value: "Jane Doe".to_string(),
            prop_name: None,
            material: None,
        };
        let v: Value = serde_json::from_str(&cmd.into_envelope().to_json()).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "service": "xpression",
                "data": {
                    "category": "takeitem",
                    "action": "EditTakeItemProperty",
                    "properties": {
                        "uuid": "id-1",
                        "takeID": 2,
                        "objName": "txtName",
                        "value": "Jane Doe",
                        "propName": null
                    }
                }
            })
        );
    }

    #[test]
    fn test_material_reference_is_optional() {
        let cmd = Command::EditTakeItemProperty {
            uuid: None,
            take_id: 4,
            obj_name: "quad".to_string(),
            value: String::new(),
            prop_name: Some("Material".to_string()),
            material: Some("flags/ca".to_string()),
        };
        let v: Value = serde_json::from_str(&cmd.into_envelope().to_json()).unwrap();
        assert_eq!(v["data"]["properties"]["material"], "flags/ca");
        assert_eq!(v["data"]["properties"]["propName"], "Material");
        assert_eq!(v["data"]["properties"]["uuid"], Value::Null);
    }

    #[test]
    fn test_start_uses_main_category() {
        let v: Value = serde_json::from_str(
            &Command::Start { uuid: None }.into_envelope().to_json(),
        )
        .unwrap();
        assert_eq!(v["data"]["category"], "main");
        assert_eq!(v["data"]["action"], "start");
    }

    #[test]
    fn test_counter_widget_envelope() {
        let cmd = Command::IncreaseCounterWidget {
            uuid: Some(CorrelationId::from("c-9")),
            name: "score".to_string(),
            increment: 3,
        };
        let v: Value = serde_json::from_str(&cmd.into_envelope().to_json()).unwrap();
        assert_eq!(v["data"]["category"], "widget");
        assert_eq!(v["data"]["action"], "IncreaseCounterWidget");
        assert_eq!(v["data"]["properties"]["increment"], 3);
    }

    #[test]
    fn test_join_is_session_level() {
        let cmd = Command::Join {
            uuid: None,
            name: "lyric".to_string(),
        };
        let v: Value = serde_json::from_str(&cmd.into_envelope().to_json()).unwrap();
        assert_eq!(v["service"], "join");
        assert!(v["data"].get("category").is_none());
    }

    #[test]
    fn test_set_uuid() {
        let mut cmd = Command::GetTakeItemStatus {
            uuid: None,
            take_id: 1,
        };
        cmd.set_uuid(CorrelationId::from("x"));
        assert_eq!(cmd.uuid(), Some(&CorrelationId::from("x")));
        assert_eq!(cmd.kind(), CommandKind::GetTakeItemStatus);
    }
}
