//! Description SCPD du service et document FeatureList Samsung.

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::errors::{ContentDirectoryError, Result};

const NS_SERVICE: &str = "urn:schemas-upnp-org:service-1-0";
const NS_AVS: &str = "urn:schemas-upnp-org:av:avs";

/// (nom, direction, variable liée)
type Argument = (&'static str, &'static str, &'static str);

const BROWSE_ARGS: &[Argument] = &[
    ("ObjectID", "in", "A_ARG_TYPE_ObjectID"),
    ("BrowseFlag", "in", "A_ARG_TYPE_BrowseFlag"),
    ("Filter", "in", "A_ARG_TYPE_Filter"),
    ("StartingIndex", "in", "A_ARG_TYPE_Index"),
    ("RequestedCount", "in", "A_ARG_TYPE_Count"),
    ("SortCriteria", "in", "A_ARG_TYPE_SortCriteria"),
    ("Result", "out", "A_ARG_TYPE_Result"),
    ("NumberReturned", "out", "A_ARG_TYPE_Count"),
    ("TotalMatches", "out", "A_ARG_TYPE_Count"),
    ("UpdateID", "out", "A_ARG_TYPE_UpdateID"),
];

const SEARCH_ARGS: &[Argument] = &[
    ("ContainerID", "in", "A_ARG_TYPE_ObjectID"),
    ("SearchCriteria", "in", "A_ARG_TYPE_SearchCriteria"),
    ("Filter", "in", "A_ARG_TYPE_Filter"),
    ("StartingIndex", "in", "A_ARG_TYPE_Index"),
    ("RequestedCount", "in", "A_ARG_TYPE_Count"),
    ("SortCriteria", "in", "A_ARG_TYPE_SortCriteria"),
    ("Result", "out", "A_ARG_TYPE_Result"),
    ("NumberReturned", "out", "A_ARG_TYPE_Count"),
    ("TotalMatches", "out", "A_ARG_TYPE_Count"),
    ("UpdateID", "out", "A_ARG_TYPE_UpdateID"),
];

const ACTIONS: &[(&str, &[Argument])] = &[
    ("Browse", BROWSE_ARGS),
    ("Search", SEARCH_ARGS),
    (
        "GetSearchCapabilities",
        &[("SearchCaps", "out", "SearchCapabilities")],
    ),
    ("GetSortCapabilities", &[("SortCaps", "out", "SortCapabilities")]),
    ("GetSystemUpdateID", &[("Id", "out", "SystemUpdateID")]),
    (
        "X_GetFeatureList",
        &[("FeatureList", "out", "A_ARG_TYPE_Featurelist")],
    ),
];

/// (nom, type, évènementielle, valeurs autorisées)
const STATE_VARIABLES: &[(&str, &str, bool, &[&str])] = &[
    ("A_ARG_TYPE_ObjectID", "string", false, &[]),
    ("A_ARG_TYPE_Result", "string", false, &[]),
    ("A_ARG_TYPE_SearchCriteria", "string", false, &[]),
    (
        "A_ARG_TYPE_BrowseFlag",
        "string",
        false,
        &["BrowseMetadata", "BrowseDirectChildren"],
    ),
    ("A_ARG_TYPE_Filter", "string", false, &[]),
    ("A_ARG_TYPE_SortCriteria", "string", false, &[]),
    ("A_ARG_TYPE_Index", "ui4", false, &[]),
    ("A_ARG_TYPE_Count", "ui4", false, &[]),
    ("A_ARG_TYPE_UpdateID", "ui4", false, &[]),
    ("A_ARG_TYPE_Featurelist", "string", false, &[]),
    ("SearchCapabilities", "string", false, &[]),
    ("SortCapabilities", "string", false, &[]),
    ("SystemUpdateID", "ui4", true, &[]),
    ("ContainerUpdateIDs", "string", true, &[]),
    ("TransferIDs", "string", true, &[]),
];

/// Classes annoncées par X_GetFeatureList
const FEATURE_CLASSES: &[&str] = &[
    "object.item.audioItem",
    "object.item.videoItem",
    "object.item.imageItem",
];

fn text_elem(name: &str, text: &str) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.to_string()));
    elem
}

/// Fabrique un <argument> complet avec ses sous-éléments
fn make_argument_elem(name: &str, direction: &str, state_var_name: &str) -> Element {
    let mut arg = Element::new("argument");
    arg.children.push(XMLNode::Element(text_elem("name", name)));
    arg.children
        .push(XMLNode::Element(text_elem("direction", direction)));
    arg.children.push(XMLNode::Element(text_elem(
        "relatedStateVariable",
        state_var_name,
    )));
    arg
}

fn make_state_variable_elem(name: &str, data_type: &str, evented: bool, allowed: &[&str]) -> Element {
    let mut var = Element::new("stateVariable");
    var.attributes.insert(
        "sendEvents".to_string(),
        if evented { "yes" } else { "no" }.to_string(),
    );
    var.children.push(XMLNode::Element(text_elem("name", name)));
    var.children
        .push(XMLNode::Element(text_elem("dataType", data_type)));

    if !allowed.is_empty() {
        let mut list = Element::new("allowedValueList");
        for value in allowed {
            list.children
                .push(XMLNode::Element(text_elem("allowedValue", value)));
        }
        var.children.push(XMLNode::Element(list));
    }
    var
}

/// Document SCPD du ContentDirectory
pub fn scpd_element() -> Element {
    let mut elem = Element::new("scpd");
    elem.attributes
        .insert("xmlns".to_string(), NS_SERVICE.to_string());

    // specVersion
    let mut spec = Element::new("specVersion");
    spec.children.push(XMLNode::Element(text_elem("major", "1")));
    spec.children.push(XMLNode::Element(text_elem("minor", "0")));
    elem.children.push(XMLNode::Element(spec));

    // actionList
    let mut actions = Element::new("actionList");
    for (name, arguments) in ACTIONS {
        let mut action = Element::new("action");
        action.children.push(XMLNode::Element(text_elem("name", name)));

        let mut list = Element::new("argumentList");
        for (arg, direction, variable) in arguments.iter() {
            list.children.push(XMLNode::Element(make_argument_elem(
                arg, direction, variable,
            )));
        }
        action.children.push(XMLNode::Element(list));
        actions.children.push(XMLNode::Element(action));
    }
    elem.children.push(XMLNode::Element(actions));

    // serviceStateTable
    let mut table = Element::new("serviceStateTable");
    for (name, data_type, evented, allowed) in STATE_VARIABLES {
        table.children.push(XMLNode::Element(make_state_variable_elem(
            name, data_type, *evented, allowed,
        )));
    }
    elem.children.push(XMLNode::Element(table));

    elem
}

/// Document `<Features>` retourné par X_GetFeatureList
pub fn feature_list_element() -> Element {
    let mut features = Element::new("Features");
    features
        .attributes
        .insert("xmlns".to_string(), NS_AVS.to_string());
    features.attributes.insert(
        "xmlns:xsi".to_string(),
        "http://www.w3.org/2001/XMLSchema-instance".to_string(),
    );
    features.attributes.insert(
        "xsi:schemaLocation".to_string(),
        format!("{NS_AVS} http://www.upnp.org/schemas/av/avs.xsd"),
    );

    let mut feature = Element::new("Feature");
    feature
        .attributes
        .insert("name".to_string(), "samsung.com_BASICVIEW".to_string());
    feature
        .attributes
        .insert("version".to_string(), "1".to_string());

    for (i, class) in FEATURE_CLASSES.iter().enumerate() {
        let mut container = Element::new("container");
        container
            .attributes
            .insert("id".to_string(), (i + 1).to_string());
        container
            .attributes
            .insert("type".to_string(), class.to_string());
        feature.children.push(XMLNode::Element(container));
    }

    features.children.push(XMLNode::Element(feature));
    features
}

pub fn feature_list_xml() -> Result<String> {
    to_xml(&feature_list_element())
}

/// Sérialise un élément avec indentation
pub fn to_xml(elem: &Element) -> Result<String> {
    let config = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("  ");

    let mut buf = Vec::new();
    elem.write_with_config(&mut buf, config)
        .map_err(|e| ContentDirectoryError::Serialization(e.to_string()))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_texts<'a>(elem: &'a Element, list: &str, item: &str) -> Vec<String> {
        elem.get_child(list)
            .unwrap()
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .filter_map(|e| e.get_child(item))
            .filter_map(|e| e.get_text())
            .map(|t| t.into_owned())
            .collect()
    }

    #[test]
    fn test_scpd_actions() {
        let scpd = scpd_element();
        assert_eq!(
            child_texts(&scpd, "actionList", "name"),
            vec![
                "Browse",
                "Search",
                "GetSearchCapabilities",
                "GetSortCapabilities",
                "GetSystemUpdateID",
                "X_GetFeatureList"
            ]
        );
    }

    #[test]
    fn test_evented_variables() {
        let scpd = scpd_element();
        let table = scpd.get_child("serviceStateTable").unwrap();
        let evented: Vec<String> = table
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .filter(|e| e.attributes.get("sendEvents").map(String::as_str) == Some("yes"))
            .filter_map(|e| e.get_child("name").and_then(|n| n.get_text()))
            .map(|t| t.into_owned())
            .collect();
        assert_eq!(evented, vec!["SystemUpdateID", "ContainerUpdateIDs", "TransferIDs"]);
    }

    #[test]
    fn test_serialized_scpd() {
        let xml = to_xml(&scpd_element()).unwrap();
        assert!(xml.contains("<allowedValue>BrowseDirectChildren</allowedValue>"));
        assert!(xml.contains("<relatedStateVariable>A_ARG_TYPE_Featurelist</relatedStateVariable>"));
    }

    #[test]
    fn test_feature_list() {
        let xml = feature_list_xml().unwrap();
        assert!(xml.contains("<Features"));
        assert!(xml.contains("name=\"samsung.com_BASICVIEW\""));
        assert!(xml.contains("type=\"object.item.videoItem\""));

        let features = feature_list_element();
        let feature = features.get_child("Feature").unwrap();
        assert_eq!(feature.children.len(), 3);
    }
}
