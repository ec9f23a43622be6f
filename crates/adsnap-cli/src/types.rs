use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct HeaderJson<'a> {
    pub(crate) path: &'a str,
    pub(crate) signature: &'a str,
    pub(crate) version: u32,
    pub(crate) captured_at: String,
    pub(crate) description: &'a str,
    pub(crate) server: &'a str,
    pub(crate) object_count: u32,
    pub(crate) attribute_count: u32,
    pub(crate) class_count: u32,
    pub(crate) prefix_count: u32,
    pub(crate) file_size: u64,
}

#[derive(Serialize)]
pub(crate) struct AttributeJson<'a> {
    pub(crate) id: u32,
    pub(crate) name: &'a str,
    pub(crate) syntax: &'a str,
    pub(crate) single_valued: bool,
    pub(crate) schema_dn: &'a str,
    pub(crate) schema_guid: &'a str,
    pub(crate) security_guid: &'a str,
}
