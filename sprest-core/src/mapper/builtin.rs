use super::{EntityMethods, PropertyDecl, StaticMethodTable};
use crate::method::{MethodDescriptor, RequestType};
use crate::target::HttpMethod;

fn entity(properties: &[&str], methods: Vec<(&str, MethodDescriptor)>) -> EntityMethods {
    EntityMethods {
        methods: methods
            .into_iter()
            .map(|(name, descriptor)| (name.to_string(), descriptor))
            .collect(),
        properties: properties
            .iter()
            .filter_map(|decl| PropertyDecl::parse(decl).ok())
            .collect(),
    }
}

fn get(returns: &str) -> MethodDescriptor {
    MethodDescriptor::new(RequestType::Get).returns(returns)
}

fn by_value(arg: &str, returns: &str) -> MethodDescriptor {
    MethodDescriptor::new(RequestType::GetWithArgsValueOnly)
        .args(&[arg])
        .returns(returns)
}

fn add(metadata_type: &str, returns: &str) -> MethodDescriptor {
    MethodDescriptor::new(RequestType::PostWithArgsInBody)
        .metadata_type(metadata_type)
        .returns(returns)
}

fn update(metadata_type: &str) -> MethodDescriptor {
    MethodDescriptor::new(RequestType::PostWithArgsInBody)
        .name("")
        .method(HttpMethod::Merge)
        .metadata_type(metadata_type)
}

fn filter(template: &str, arg: &str, returns: &str) -> MethodDescriptor {
    MethodDescriptor::new(RequestType::GetReplace)
        .args(&[arg])
        .name(template)
        .returns(returns)
}

fn delete() -> MethodDescriptor {
    MethodDescriptor::new(RequestType::Delete)
}

fn query() -> MethodDescriptor {
    MethodDescriptor::new(RequestType::OData).args(&["oData"])
}

/// The method table shipped with the client, covering the common SharePoint entity types.
pub fn builtin_table() -> StaticMethodTable {
    let mut table = StaticMethodTable::new();

    table.insert(
        "web",
        entity(
            &[
                "AllProperties|propertyvalues",
                "AssociatedMemberGroup|group",
                "AssociatedOwnerGroup|group",
                "AssociatedVisitorGroup|group",
                "AvailableContentTypes|contenttypes",
                "AvailableFields|fields",
                "ContentTypes|contenttypes|('[Name]')|contenttype",
                "CurrentUser|user",
                "EventReceivers|eventreceivers|('[Name]')|eventreceiverdefinition",
                "Fields|fields|/getByInternalNameOrTitle('[Name]')|field",
                "Lists|lists|/getByTitle('[Name]')|list",
                "RootFolder|folder",
                "SiteGroups|sitegroups|/getByName('[Name]')|group",
                "SiteUsers|users|/getById([Name])|user",
                "Webs|webs",
            ],
            vec![
                ("delete", delete()),
                (
                    "ensureUser",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly)
                        .args(&["logonName"])
                        .returns("user"),
                ),
                ("getFileByServerRelativeUrl", by_value("serverRelativeUrl", "file")),
                ("getFolderByServerRelativeUrl", by_value("serverRelativeUrl", "folder")),
                ("getList", by_value("strUrl", "list")),
                ("getUserById", by_value("id", "user")),
                ("query", query()),
                ("update", update("SP.Web")),
            ],
        ),
    );

    table.insert(
        "webs",
        entity(&[], vec![("add", add("SP.WebCreationInformation", "web")), ("query", query())]),
    );

    table.insert(
        "site",
        entity(
            &[
                "RootWeb|web",
                "UserCustomActions|usercustomactions|('[Name]')|usercustomaction",
            ],
            vec![
                (
                    "openWebById",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly)
                        .args(&["gWebId"])
                        .returns("web"),
                ),
                ("query", query()),
            ],
        ),
    );

    table.insert(
        "lists",
        entity(
            &[],
            vec![
                ("add", add("SP.List", "list")),
                ("getById", by_value("id", "list")),
                ("getByTitle", by_value("title", "list")),
                ("query", query()),
            ],
        ),
    );

    table.insert(
        "list",
        entity(
            &[
                "ContentTypes|contenttypes|('[Name]')|contenttype",
                "DefaultView|view",
                "EventReceivers|eventreceivers|('[Name]')|eventreceiverdefinition",
                "Fields|fields|/getByInternalNameOrTitle('[Name]')|field",
                "Items|items|([Name])|listitem",
                "ParentWeb|web",
                "RootFolder|folder",
                "Views|views|('[Name]')|view",
            ],
            vec![
                (
                    "breakRoleInheritance",
                    MethodDescriptor::new(RequestType::PostWithArgs)
                        .args(&["copyRoleAssignments", "clearSubscopes"]),
                ),
                ("delete", delete()),
                ("getItemById", by_value("id", "listitem")),
                (
                    "getItems",
                    MethodDescriptor::new(RequestType::PostWithArgsInBody)
                        .args(&["query"])
                        .metadata_type("SP.CamlQuery")
                        .returns("items"),
                ),
                ("query", query()),
                ("update", update("SP.List")),
            ],
        ),
    );

    table.insert(
        "items",
        entity(
            &[],
            vec![
                ("add", add("SP.ListItem", "listitem").inherit_metadata_type()),
                ("getById", by_value("id", "listitem")),
                ("query", query()),
            ],
        ),
    );

    table.insert(
        "listitem",
        entity(
            &[
                "AttachmentFiles|attachmentfiles",
                "ContentType|contenttype",
                "File|file",
                "Folder|folder",
                "ParentList|list",
            ],
            vec![
                ("delete", delete()),
                ("recycle", MethodDescriptor::new(RequestType::Post)),
                (
                    "update",
                    MethodDescriptor::new(RequestType::PostWithArgsInBody)
                        .name("")
                        .method(HttpMethod::Merge)
                        .inherit_metadata_type(),
                ),
            ],
        ),
    );

    table.insert(
        "fields",
        entity(
            &[],
            vec![
                ("add", add("SP.Field", "field")),
                (
                    "createFieldAsXml",
                    MethodDescriptor::new(RequestType::PostWithArgsInBody)
                        .args(&["parameters"])
                        .metadata_type("SP.XmlSchemaFieldCreationInformation")
                        .returns("field"),
                ),
                ("getById", by_value("id", "field")),
                ("getByInternalNameOrTitle", by_value("internalNameOrTitle", "field")),
                ("getByTitle", by_value("title", "field")),
                ("query", query()),
            ],
        ),
    );

    table.insert(
        "field",
        entity(
            &[],
            vec![
                ("delete", delete()),
                (
                    "setShowInDisplayForm",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["showInForm"]),
                ),
                (
                    "update",
                    MethodDescriptor::new(RequestType::PostWithArgsInBody)
                        .name("")
                        .method(HttpMethod::Merge)
                        .inherit_metadata_type(),
                ),
            ],
        ),
    );

    table.insert(
        "contenttypes",
        entity(
            &[],
            vec![
                ("add", add("SP.ContentType", "contenttype")),
                (
                    "addAvailableContentType",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly)
                        .args(&["contentTypeId"])
                        .returns("contenttype"),
                ),
                ("getById", by_value("id", "contenttype")),
                ("query", query()),
            ],
        ),
    );

    table.insert(
        "contenttype",
        entity(
            &["FieldLinks|fieldlinks|('[Name]')|fieldlink", "Fields|fields"],
            vec![
                (
                    "addFieldLink",
                    MethodDescriptor::new(RequestType::PostWithArgsInBody)
                        .name("fieldlinks")
                        .metadata_type("SP.FieldLink"),
                ),
                ("delete", delete()),
                (
                    "getFieldByInternalName",
                    filter("fields?$filter=InternalName eq '[[name]]'", "name", "fields"),
                ),
                (
                    "getFieldByStaticName",
                    filter("fields?$filter=StaticName eq '[[name]]'", "name", "fields"),
                ),
                (
                    "getFieldByTitle",
                    filter("fields?$filter=Title eq '[[title]]'", "title", "fields"),
                ),
                (
                    "getFieldLinkByName",
                    filter("fields?$filter=Name eq '[[name]]'", "name", "fields"),
                ),
                ("update", update("SP.ContentType")),
            ],
        ),
    );

    table.insert(
        "fieldlinks",
        entity(
            &[],
            vec![("add", add("SP.FieldLink", "fieldlink")), ("getById", by_value("id", "fieldlink"))],
        ),
    );

    table.insert(
        "views",
        entity(
            &[],
            vec![
                ("add", add("SP.View", "view")),
                ("getById", by_value("id", "view")),
                ("getByTitle", by_value("title", "view")),
                ("query", query()),
            ],
        ),
    );

    table.insert(
        "view",
        entity(
            &["ViewFields|viewfieldcollection"],
            vec![
                ("delete", delete()),
                ("renderAsHtml", MethodDescriptor::new(RequestType::Get)),
                ("update", update("SP.View")),
            ],
        ),
    );

    table.insert(
        "viewfieldcollection",
        entity(
            &[],
            vec![
                (
                    "addViewField",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["strField"]),
                ),
                (
                    "moveViewFieldTo",
                    MethodDescriptor::new(RequestType::PostWithArgsInBody).args(&["field", "index"]),
                ),
                ("removeAllViewFields", MethodDescriptor::new(RequestType::Post)),
                (
                    "removeViewField",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["strField"]),
                ),
            ],
        ),
    );

    table.insert(
        "sitegroups",
        entity(
            &[],
            vec![
                ("add", add("SP.Group", "group")),
                ("getById", by_value("id", "group")),
                ("getByName", by_value("name", "group")),
                (
                    "removeById",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["id"]),
                ),
                (
                    "removeByLoginName",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["loginName"]),
                ),
            ],
        ),
    );

    table.insert(
        "group",
        entity(
            &["Owner|user", "Users|users|/getById([Name])|user"],
            vec![("update", update("SP.Group"))],
        ),
    );

    table.insert(
        "users",
        entity(
            &[],
            vec![
                ("add", add("SP.User", "user")),
                ("getByEmail", by_value("email", "user")),
                ("getById", by_value("id", "user")),
                ("getByLoginName", by_value("loginName", "user")),
                (
                    "removeById",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["id"]),
                ),
            ],
        ),
    );

    table.insert(
        "user",
        entity(&["Groups|sitegroups|([Name])|group"], vec![("delete", delete())]),
    );

    table.insert(
        "userprofile",
        entity(
            &["PersonalSite|site"],
            vec![
                (
                    "createPersonalSiteEnque",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly),
                ),
                (
                    "shareAllSocialData",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly),
                ),
            ],
        ),
    );

    table.insert(
        "peoplemanager",
        entity(
            &[],
            vec![
                ("getMyProperties", get("personproperties")),
                (
                    "getPropertiesFor",
                    MethodDescriptor::new(RequestType::GetWithArgsInQS)
                        .args(&["accountName"])
                        .returns("personproperties"),
                ),
                (
                    "follow",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["accountName"]),
                ),
                (
                    "stopFollowing",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["accountName"]),
                ),
            ],
        ),
    );

    table.insert(
        "eventreceivers",
        entity(
            &[],
            vec![
                ("add", add("SP.EventReceiverDefinitionCreationInformation", "eventreceiverdefinition")),
                ("getById", by_value("eventReceiverId", "eventreceiverdefinition")),
            ],
        ),
    );

    table.insert(
        "eventreceiverdefinition",
        entity(&[], vec![("delete", delete()), ("update", update("SP.EventReceiverDefinition"))]),
    );

    table.insert(
        "email",
        entity(
            &[],
            vec![(
                "send",
                MethodDescriptor::new(RequestType::PostWithArgsInBody)
                    .args(&["properties"])
                    .name("")
                    .metadata_type("SP.Utilities.EmailProperties"),
            )],
        ),
    );

    table.insert(
        "file",
        entity(
            &["Author|user", "ListItemAllFields|listitem", "Versions|fileversions"],
            vec![
                (
                    "checkIn",
                    MethodDescriptor::new(RequestType::PostWithArgs).args(&["comment", "checkInType"]),
                ),
                ("checkOut", MethodDescriptor::new(RequestType::Post)),
                (
                    "content",
                    MethodDescriptor::new(RequestType::GetBuffer).name("$value"),
                ),
                ("delete", delete()),
                (
                    "publish",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly).args(&["comment"]),
                ),
            ],
        ),
    );

    table.insert(
        "files",
        entity(
            &[],
            vec![
                (
                    "add",
                    MethodDescriptor::new(RequestType::PostWithArgs)
                        .args(&["overwrite", "url"])
                        .returns("file"),
                ),
                ("getByUrl", by_value("serverRelativeUrl", "file")),
            ],
        ),
    );

    table.insert(
        "folder",
        entity(
            &[
                "Files|files|/getByUrl('[Name]')|file",
                "Folders|folders|/getByUrl('[Name]')|folder",
                "ListItemAllFields|listitem",
                "ParentFolder|folder",
            ],
            vec![("delete", delete())],
        ),
    );

    table.insert(
        "folders",
        entity(
            &[],
            vec![
                (
                    "add",
                    MethodDescriptor::new(RequestType::PostWithArgsValueOnly)
                        .args(&["url"])
                        .returns("folder"),
                ),
                ("getByUrl", by_value("serverRelativeUrl", "folder")),
            ],
        ),
    );

    table
}
