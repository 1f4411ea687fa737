use scenesync_common::{AspectId, ChangeOrigin, NodeId, NodeType, PropertyValue, SceneChange};

/// A value a backend job wants mirrored onto a frontend property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyWrite {
    pub subject: NodeId,
    pub subject_type: NodeType,
    pub property: String,
    pub value: PropertyValue,
}

/// Write-backs collected from the jobs of one frame, in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendWrites {
    writes: Vec<PropertyWrite>,
}

impl BackendWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(
        &mut self,
        subject: NodeId,
        subject_type: NodeType,
        property: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) {
        self.writes.push(PropertyWrite {
            subject,
            subject_type,
            property: property.into(),
            value: value.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyWrite> {
        self.writes.iter()
    }

    /// Turn the writes into update records stamped with the producing aspect.
    pub fn into_changes(self, aspect: AspectId) -> Vec<SceneChange> {
        self.writes
            .into_iter()
            .map(|w| {
                SceneChange::property_updated(w.subject, w.subject_type, w.property, w.value)
                    .with_origin(ChangeOrigin::Backend(aspect))
            })
            .collect()
    }
}

/// One unit of backend work for a frame.
///
/// Jobs of the same aspect may name each other as dependencies; a job only
/// runs once every job it names has finished.
pub trait Job: Send {
    fn name(&self) -> &'static str;

    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    fn run(&mut self, writes: &mut BackendWrites);
}
