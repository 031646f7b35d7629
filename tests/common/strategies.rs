use proptest::prelude::*;

/// Quorum host names, never the offline sentinel
pub fn host_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,10}".prop_filter("offline sentinel", |host| host != "none")
}

/// Distinct hosts making up one quorum
pub fn quorum_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(host_strategy(), 1..5)
        .prop_map(|hosts| hosts.into_iter().collect())
}

/// The same quorum twice: once as generated (canonical), once shuffled with random casing
pub fn quorum_respelling_strategy() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    quorum_strategy().prop_flat_map(|hosts| {
        let len = hosts.len();
        (
            Just(hosts.clone()),
            Just(hosts).prop_shuffle(),
            prop::collection::vec(any::<bool>(), len),
        )
            .prop_map(|(canonical, shuffled, upper)| {
                let respelled = shuffled
                    .into_iter()
                    .zip(upper)
                    .map(|(host, up)| if up { host.to_uppercase() } else { host })
                    .collect();
                (canonical, respelled)
            })
    })
}

pub fn port_strategy() -> impl Strategy<Value = u16> {
    1u16..=u16::MAX
}

/// `;key=value` attributes; keys avoid the `test` marker
pub fn attributes_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-su-z][a-z_]{0,8}", "[a-zA-Z0-9]{1,8}"), 0..4)
}

pub fn target_string(quorum: &[String], port: u16, attributes: &[(String, String)]) -> String {
    let mut target = format!("tasker:{}:{port}", quorum.join(","));
    for (key, value) in attributes {
        target.push_str(&format!(";{key}={value}"));
    }
    target
}
