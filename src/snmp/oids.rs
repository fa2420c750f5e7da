//! Well-known OID definitions and request presets.
//!
//! OIDs are opaque dotted-decimal strings throughout the crate; this
//! table only maps the common symbolic names the CLI accepts.

// System MIB (RFC 1213)
pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
pub const SYS_OBJECT_ID: &str = "1.3.6.1.2.1.1.2.0";
pub const SYS_UPTIME: &str = "1.3.6.1.2.1.1.3.0";
pub const SYS_CONTACT: &str = "1.3.6.1.2.1.1.4.0";
pub const SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";
pub const SYS_LOCATION: &str = "1.3.6.1.2.1.1.6.0";
pub const SYS_SERVICES: &str = "1.3.6.1.2.1.1.7.0";

// Interfaces MIB (IF-MIB)
pub const IF_NUMBER: &str = "1.3.6.1.2.1.2.1.0";
pub const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
pub const IF_TYPE: &str = "1.3.6.1.2.1.2.2.1.3";
pub const IF_MTU: &str = "1.3.6.1.2.1.2.2.1.4";
pub const IF_SPEED: &str = "1.3.6.1.2.1.2.2.1.5";
pub const IF_OPER_STATUS: &str = "1.3.6.1.2.1.2.2.1.8";

// IP MIB
pub const IP_ADDR_TABLE: &str = "1.3.6.1.2.1.4.20";

// Host Resources MIB
pub const HR_SYSTEM_UPTIME: &str = "1.3.6.1.2.1.25.1.1.0";
pub const HR_SYSTEM_DATE: &str = "1.3.6.1.2.1.25.1.2.0";
pub const HR_PROCESSOR_LOAD: &str = "1.3.6.1.2.1.25.3.3.1.2";
pub const HR_STORAGE_USED: &str = "1.3.6.1.2.1.25.2.3.1.6";
pub const HR_STORAGE_SIZE: &str = "1.3.6.1.2.1.25.2.3.1.5";

// SNMPv2 notification varbinds (RFC 3418)
pub const SNMP_TRAP_OID: &str = "1.3.6.1.6.3.1.1.4.1.0";

/// Symbolic name → OID table accepted anywhere the CLI takes an OID.
pub const NAMED_OIDS: &[(&str, &str)] = &[
    ("sysDescr", SYS_DESCR),
    ("sysObjectID", SYS_OBJECT_ID),
    ("sysUpTime", SYS_UPTIME),
    ("sysContact", SYS_CONTACT),
    ("sysName", SYS_NAME),
    ("sysLocation", SYS_LOCATION),
    ("sysServices", SYS_SERVICES),
    ("ifNumber", IF_NUMBER),
    ("ifDescr", IF_DESCR),
    ("ifType", IF_TYPE),
    ("ifMtu", IF_MTU),
    ("ifSpeed", IF_SPEED),
    ("ifOperStatus", IF_OPER_STATUS),
    ("ipAddrTable", IP_ADDR_TABLE),
    ("hrSystemUptime", HR_SYSTEM_UPTIME),
    ("hrSystemDate", HR_SYSTEM_DATE),
    ("hrProcessorLoad", HR_PROCESSOR_LOAD),
    ("hrStorageUsed", HR_STORAGE_USED),
    ("hrStorageSize", HR_STORAGE_SIZE),
];

/// Resolve a symbolic name to its OID.
pub fn lookup(name: &str) -> Option<&'static str> {
    NAMED_OIDS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, oid)| *oid)
}

/// Reverse lookup: symbolic name for a well-known OID.
pub fn name_of(oid: &str) -> Option<&'static str> {
    NAMED_OIDS
        .iter()
        .find(|(_, o)| *o == oid)
        .map(|(n, _)| *n)
}

/// Preset OID groups selectable with `--preset`.
pub fn preset(name: &str) -> Option<&'static [&'static str]> {
    match name.to_lowercase().as_str() {
        "sysinfo" => Some(&[SYS_DESCR, SYS_UPTIME, SYS_CONTACT, SYS_NAME, SYS_LOCATION]),
        "interfaces" => Some(&[IF_NUMBER, IF_DESCR, IF_SPEED, IF_OPER_STATUS]),
        "host_resources" => Some(&[HR_SYSTEM_UPTIME, HR_SYSTEM_DATE, HR_PROCESSOR_LOAD]),
        _ => None,
    }
}

/// Combine a preset and explicit OIDs/names into a deduplicated list,
/// preserving first-seen order. Unknown preset names are ignored with a
/// warning; unknown symbolic names pass through as-is (they may be raw
/// OIDs).
pub fn resolve_oids(oids: &[String], preset_name: Option<&str>) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();

    if let Some(name) = preset_name {
        match preset(name) {
            Some(group) => resolved.extend(group.iter().map(|s| s.to_string())),
            None => tracing::warn!("unknown preset: {}", name),
        }
    }

    for oid in oids {
        match lookup(oid) {
            Some(known) => resolved.push(known.to_string()),
            None => resolved.push(oid.clone()),
        }
    }

    let mut seen = std::collections::HashSet::new();
    resolved.retain(|oid| seen.insert(oid.clone()));
    resolved
}

/// Subtree membership test used to bound a GETNEXT walk: `oid` must lie
/// strictly under `root`.
pub fn in_subtree(oid: &str, root: &str) -> bool {
    oid.len() > root.len() && oid.starts_with(root) && oid.as_bytes()[root.len()] == b'.'
}
