use serde::Serialize;

/// Id of the root department. Searching it applies no extra tags.
pub const ROOT_ID: &str = "";

/// A named filter bucket the host shows as a browsable department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Department {
    All,
    Notes,
    Passwords,
    Files,
}

impl Department {
    pub const SUBDEPARTMENTS: [Department; 3] =
        [Department::Notes, Department::Passwords, Department::Files];

    /// Look up a department by the id the host hands back. Unknown ids
    /// yield `None`.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            ROOT_ID => Some(Self::All),
            "Notes" => Some(Self::Notes),
            "Passwords" => Some(Self::Passwords),
            "Files" => Some(Self::Files),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::All => ROOT_ID,
            Self::Notes => "Notes",
            Self::Passwords => "Passwords",
            Self::Files => "Files",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All CrypTag Data",
            Self::Notes => "Notes",
            Self::Passwords => "Passwords",
            Self::Files => "Files",
        }
    }

    /// Plaintext tags every row in this department carries.
    pub fn required_tags(self) -> &'static [&'static str] {
        match self {
            Self::All => &[],
            Self::Notes => &["type:text", "type:note"],
            Self::Passwords => &["type:text", "type:password"],
            Self::Files => &["type:file"],
        }
    }
}

/// Department tree registered with the host on every search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentNode {
    pub id: String,
    pub label: String,
    /// Query text the department link carries.
    pub query: String,
    pub subdepartments: Vec<DepartmentNode>,
}

impl DepartmentNode {
    fn leaf(dept: Department, query: &str) -> Self {
        Self {
            id: dept.id().to_string(),
            label: dept.label().to_string(),
            query: query.to_string(),
            subdepartments: Vec::new(),
        }
    }
}

/// Build the root department with Notes, Passwords and Files beneath it.
pub fn department_tree(query: &str) -> DepartmentNode {
    let mut root = DepartmentNode::leaf(Department::All, query);
    root.subdepartments = Department::SUBDEPARTMENTS
        .iter()
        .map(|d| DepartmentNode::leaf(*d, query))
        .collect();
    root
}
