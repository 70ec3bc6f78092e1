//! SOAP Faults du ContentDirectory

use xmltree::{Element, EmitterConfig, XMLNode};

use crate::errors::ContentDirectoryError;

const NS_SOAP_ENVELOPE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const NS_UPNP_CONTROL: &str = "urn:schemas-upnp-org:control-1-0";

fn text_elem(name: &str, text: &str) -> Element {
    let mut elem = Element::new(name);
    elem.children.push(XMLNode::Text(text.to_string()));
    elem
}

/// Construit un SOAP Fault XML
///
/// # Arguments
///
/// * `fault_code` - Code du fault (ex: "s:Client")
/// * `fault_string` - Message d'erreur
/// * `upnp_error_code` - Code d'erreur UPnP optionnel (ex: "701")
/// * `upnp_error_desc` - Description d'erreur UPnP optionnelle
pub fn build_soap_fault(
    fault_code: &str,
    fault_string: &str,
    upnp_error_code: Option<&str>,
    upnp_error_desc: Option<&str>,
) -> Result<String, xmltree::Error> {
    let mut fault = Element::new("s:Fault");
    fault
        .children
        .push(XMLNode::Element(text_elem("faultcode", fault_code)));
    fault
        .children
        .push(XMLNode::Element(text_elem("faultstring", fault_string)));

    // detail (si erreur UPnP)
    if let (Some(code), Some(desc)) = (upnp_error_code, upnp_error_desc) {
        let mut upnp_error = Element::new("UPnPError");
        upnp_error
            .attributes
            .insert("xmlns".to_string(), NS_UPNP_CONTROL.to_string());
        upnp_error
            .children
            .push(XMLNode::Element(text_elem("errorCode", code)));
        upnp_error
            .children
            .push(XMLNode::Element(text_elem("errorDescription", desc)));

        let mut detail = Element::new("detail");
        detail.children.push(XMLNode::Element(upnp_error));
        fault.children.push(XMLNode::Element(detail));
    }

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(fault));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), NS_SOAP_ENVELOPE.to_string());
    envelope.attributes.insert(
        "s:encodingStyle".to_string(),
        "http://schemas.xmlsoap.org/soap/encoding/".to_string(),
    );
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("  ");
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl ContentDirectoryError {
    /// Fault SOAP `UPnPError` correspondant à l'erreur
    pub fn to_soap_fault(&self) -> Result<String, xmltree::Error> {
        let (code, description) = self.upnp_error();
        build_soap_fault(
            "s:Client",
            "UPnPError",
            Some(&code.to_string()),
            Some(description),
        )
    }
}
