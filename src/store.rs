//! The storage engine and location objects.
//!
//! [`Store`] owns the backing-store namespace (store name → object tree), the
//! object arena, and the handle registry, behind a `RwLock` so the API stays
//! `&self` and thread-safe for distinct handles. Wrapper objects ([`File`],
//! [`Group`], [`crate::DataSet`], [`crate::Attribute`]) hold exactly one
//! handle each and release it once, either through `close` or on drop.
//!
//! The byte-level persistence of a store is the storage engine's concern and
//! deliberately opaque here; this layer shapes validated calls into it.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, info, instrument};

use crate::attribute::Attribute;
use crate::codec;
use crate::dataset::DataSet;
use crate::datatype::TypeDescriptor;
use crate::dataspace::{Extent, SpaceDescriptor};
use crate::error::{Result, StoreError};
use crate::handle::{Handle, HandleKind, HandleRegistry};
use crate::proplist::{PropertyList, PropertyListClass};
use crate::value::Value;

/// Kind of an immediate child of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// A sub-group.
    Group,

    /// A dataset.
    DataSet,

    /// A committed named type.
    NamedType,
}

type ObjectId = u64;

/// One attribute's storage: type, shape, and fixed-size value bytes.
#[derive(Debug, Clone)]
struct AttrEntry {
    dtype: TypeDescriptor,
    space: SpaceDescriptor,
    data: Vec<u8>,
}

#[derive(Debug)]
struct GroupNode {
    children: Vec<(String, ObjectId)>,
    attrs: Vec<(String, AttrEntry)>,
}

#[derive(Debug)]
struct DatasetNode {
    dtype: TypeDescriptor,
    space: SpaceDescriptor,
    data: Vec<u8>,
    chunk_dims: Option<Vec<u64>>,
    compression: Option<u32>,
    attrs: Vec<(String, AttrEntry)>,
}

#[derive(Debug)]
struct TypeNode {
    dtype: TypeDescriptor,
    attrs: Vec<(String, AttrEntry)>,
}

#[derive(Debug)]
enum ObjectNode {
    Group(GroupNode),
    Dataset(DatasetNode),
    NamedType(TypeNode),
}

impl ObjectNode {
    fn attrs(&self) -> &Vec<(String, AttrEntry)> {
        match self {
            ObjectNode::Group(g) => &g.attrs,
            ObjectNode::Dataset(d) => &d.attrs,
            ObjectNode::NamedType(t) => &t.attrs,
        }
    }

    fn attrs_mut(&mut self) -> &mut Vec<(String, AttrEntry)> {
        match self {
            ObjectNode::Group(g) => &mut g.attrs,
            ObjectNode::Dataset(d) => &mut d.attrs,
            ObjectNode::NamedType(t) => &mut t.attrs,
        }
    }
}

/// What an open handle refers to.
#[derive(Debug, Clone)]
enum Target {
    /// A group, dataset, or named type in the arena. For `File` handles this
    /// is the file's root group.
    Object(ObjectId),

    /// An attribute, addressed by its owner and name.
    Attribute { owner: ObjectId, name: String },
}

/// Per-handle state beyond what the registry records.
#[derive(Debug, Clone)]
struct Binding {
    target: Target,
    /// Root group of the file this handle belongs to.
    file_root: ObjectId,
    /// Access mode inherited from the file handle this was opened through.
    read_only: bool,
    /// Backing-store name, for error reporting.
    store_name: String,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Backing-store namespace: store name → root group.
    files: HashMap<String, ObjectId>,
    objects: HashMap<ObjectId, ObjectNode>,
    registry: HandleRegistry,
    bindings: HashMap<u64, Binding>,
    next_object: ObjectId,
    next_handle: u64,
}

/// The storage engine: backing-store namespace, object arena, handle registry.
///
/// All operations are synchronous and blocking. Internal state is guarded by
/// a `RwLock`; two threads must still not operate on the *same* handle
/// concurrently without external coordination.
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<StoreInner>,
}

const LOCATION_KINDS: &[HandleKind] = &[HandleKind::File, HandleKind::Group];
const ATTR_OWNER_KINDS: &[HandleKind] = &[
    HandleKind::File,
    HandleKind::Group,
    HandleKind::DataSet,
    HandleKind::NamedType,
];

impl Store {
    /// Creates an empty engine with no backing stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new backing store.
    ///
    /// # Arguments
    ///
    /// * `name` - Backing store name.
    /// * `fail_if_exists` - Fail instead of truncating an existing store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the store exists and
    /// `fail_if_exists` is set. Without it, an existing store is truncated:
    /// its old tree is discarded and handles into it become invalid.
    #[instrument(skip(self))]
    pub fn create_file(&self, name: &str, fail_if_exists: bool) -> Result<File<'_>> {
        if name.is_empty() {
            return Err(StoreError::EmptyName("file"));
        }
        let mut inner = self.write_lock();
        if let Some(&old_root) = inner.files.get(name) {
            if fail_if_exists {
                return Err(StoreError::AlreadyExists(name.to_string()));
            }
            debug!(name, "truncating existing store");
            delete_subtree(&mut inner, old_root);
        }
        let root = alloc_object(
            &mut inner,
            ObjectNode::Group(GroupNode {
                children: Vec::new(),
                attrs: Vec::new(),
            }),
        );
        inner.files.insert(name.to_string(), root);
        let handle = bind_handle(
            &mut inner,
            HandleKind::File,
            Some("create_file"),
            Binding {
                target: Target::Object(root),
                file_root: root,
                read_only: false,
                store_name: name.to_string(),
            },
        )?;
        info!(name, %handle, "created store");
        Ok(File {
            store: self,
            handle,
            name: name.to_string(),
            open: true,
        })
    }

    /// Opens an existing backing store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the store does not exist.
    #[instrument(skip(self))]
    pub fn open_file(&self, name: &str, read_only: bool) -> Result<File<'_>> {
        let mut inner = self.write_lock();
        let root = *inner
            .files
            .get(name)
            .ok_or_else(|| StoreError::not_found("file", name))?;
        let handle = bind_handle(
            &mut inner,
            HandleKind::File,
            Some("open_file"),
            Binding {
                target: Target::Object(root),
                file_root: root,
                read_only,
                store_name: name.to_string(),
            },
        )?;
        debug!(name, %handle, read_only, "opened store");
        Ok(File {
            store: self,
            handle,
            name: name.to_string(),
            open: true,
        })
    }

    /// Number of currently open handles across the whole engine.
    pub fn open_handle_count(&self) -> usize {
        self.read_lock().registry.open_count()
    }

    /// Dumps every open handle for diagnostics and leak assertions.
    pub fn dump_open_handles(&self) -> Vec<(Handle, HandleKind, Option<&'static str>)> {
        self.read_lock().registry.dump_open_handles()
    }

    /// Releases a handle. Wrapper `close`/`Drop` call this; it is exposed for
    /// tests that drive lifetimes manually.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyClosed`] on a second release.
    pub fn close_handle(&self, handle: Handle) -> Result<()> {
        let mut inner = self.write_lock();
        inner.registry.release(handle)?;
        inner.bindings.remove(&handle.raw());
        debug!(%handle, "closed handle");
        Ok(())
    }

    // ---- location operations -------------------------------------------

    pub(crate) fn create_group_at<'s>(&'s self, parent: Handle, name: &str) -> Result<Group<'s>> {
        let mut inner = self.write_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        require_writable(&inner, parent)?;
        validate_simple_name(name, "group")?;
        if child_id(&inner, parent_id, name).is_some() {
            return Err(StoreError::DuplicateChild(name.to_string()));
        }
        let id = alloc_object(
            &mut inner,
            ObjectNode::Group(GroupNode {
                children: Vec::new(),
                attrs: Vec::new(),
            }),
        );
        add_child(&mut inner, parent_id, name, id);
        let binding = child_binding(&inner, parent, Target::Object(id))?;
        let handle = bind_handle(&mut inner, HandleKind::Group, Some("create_group"), binding)?;
        debug!(name, %handle, "created group");
        Ok(Group {
            store: self,
            handle,
            name: name.to_string(),
            open: true,
        })
    }

    pub(crate) fn open_group_at<'s>(&'s self, parent: Handle, name: &str) -> Result<Group<'s>> {
        let mut inner = self.write_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        validate_simple_name(name, "group")?;
        let id = child_id(&inner, parent_id, name)
            .filter(|id| matches!(inner.objects.get(id), Some(ObjectNode::Group(_))))
            .ok_or_else(|| StoreError::not_found("group", name))?;
        let binding = child_binding(&inner, parent, Target::Object(id))?;
        let handle = bind_handle(&mut inner, HandleKind::Group, Some("open_group"), binding)?;
        Ok(Group {
            store: self,
            handle,
            name: name.to_string(),
            open: true,
        })
    }

    pub(crate) fn delete_group_at(&self, parent: Handle, name: &str) -> Result<()> {
        let mut inner = self.write_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        require_writable(&inner, parent)?;
        validate_simple_name(name, "group")?;
        let id = child_id(&inner, parent_id, name)
            .filter(|id| matches!(inner.objects.get(id), Some(ObjectNode::Group(_))))
            .ok_or_else(|| StoreError::not_found("group", name))?;
        remove_child(&mut inner, parent_id, name);
        delete_subtree(&mut inner, id);
        debug!(name, "deleted group");
        Ok(())
    }

    pub(crate) fn group_exists_at(&self, parent: Handle, name: &str) -> Result<bool> {
        let inner = self.read_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        validate_simple_name(name, "group")?;
        Ok(child_id(&inner, parent_id, name)
            .is_some_and(|id| matches!(inner.objects.get(&id), Some(ObjectNode::Group(_)))))
    }

    pub(crate) fn group_path_exists_at(&self, parent: Handle, path: &str) -> Result<bool> {
        let inner = self.read_lock();
        let mut current = locate_object(&inner, parent, LOCATION_KINDS)?;
        let mut seen_segment = false;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            seen_segment = true;
            match child_id(&inner, current, segment) {
                Some(id) if matches!(inner.objects.get(&id), Some(ObjectNode::Group(_))) => {
                    current = id;
                }
                // Missing intermediates report false, never an error.
                _ => return Ok(false),
            }
        }
        Ok(seen_segment)
    }

    pub(crate) fn list_children_at(&self, parent: Handle) -> Result<Vec<(String, ChildKind)>> {
        let inner = self.read_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        let group = group_node(&inner, parent, parent_id)?;
        Ok(group
            .children
            .iter()
            .map(|(name, id)| {
                let kind = match inner.objects.get(id) {
                    Some(ObjectNode::Dataset(_)) => ChildKind::DataSet,
                    Some(ObjectNode::NamedType(_)) => ChildKind::NamedType,
                    _ => ChildKind::Group,
                };
                (name.clone(), kind)
            })
            .collect())
    }

    // ---- datasets -------------------------------------------------------

    pub(crate) fn create_dataset_at<'s>(
        &'s self,
        parent: Handle,
        name: &str,
        dtype: &TypeDescriptor,
        space: &SpaceDescriptor,
        plist: Option<&PropertyList>,
    ) -> Result<DataSet<'s>> {
        let mut inner = self.write_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        require_writable(&inner, parent)?;
        validate_simple_name(name, "dataset")?;
        if child_id(&inner, parent_id, name).is_some() {
            return Err(StoreError::DuplicateChild(name.to_string()));
        }
        let elem_size = dtype
            .byte_size()
            .ok_or_else(|| StoreError::unsupported("variable-length dataset element type"))?;

        let (chunk_dims, compression) = match plist {
            Some(p) => {
                if p.class() != PropertyListClass::DatasetCreate {
                    return Err(StoreError::WrongPropertyClass {
                        found: p.class(),
                        expected: PropertyListClass::DatasetCreate,
                    });
                }
                if let Some(dims) = p.chunk_dimensions() {
                    if dims.len() != space.rank() {
                        return Err(StoreError::ShapeMismatch {
                            expected: space.rank() as u64,
                            actual: dims.len() as u64,
                        });
                    }
                }
                (
                    p.chunk_dimensions().map(<[u64]>::to_vec),
                    p.compression_level(),
                )
            }
            None => (None, None),
        };
        let has_unlimited = space
            .dimensions()
            .iter()
            .any(|&(_, max)| max == Extent::Unlimited);
        if has_unlimited && chunk_dims.is_none() {
            return Err(StoreError::unsupported(
                "unlimited dimensions require chunked layout",
            ));
        }

        let data = vec![0u8; elem_size * space.element_count() as usize];
        let id = alloc_object(
            &mut inner,
            ObjectNode::Dataset(DatasetNode {
                dtype: dtype.clone(),
                space: space.clone(),
                data,
                chunk_dims,
                compression,
                attrs: Vec::new(),
            }),
        );
        add_child(&mut inner, parent_id, name, id);
        let binding = child_binding(&inner, parent, Target::Object(id))?;
        let handle = bind_handle(&mut inner, HandleKind::DataSet, Some("create_dataset"), binding)?;
        debug!(name, %handle, "created dataset");
        Ok(DataSet::bind(self, handle, name.to_string()))
    }

    pub(crate) fn open_dataset_at<'s>(&'s self, parent: Handle, name: &str) -> Result<DataSet<'s>> {
        let mut inner = self.write_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        validate_simple_name(name, "dataset")?;
        let id = child_id(&inner, parent_id, name)
            .filter(|id| matches!(inner.objects.get(id), Some(ObjectNode::Dataset(_))))
            .ok_or_else(|| StoreError::not_found("dataset", name))?;
        let binding = child_binding(&inner, parent, Target::Object(id))?;
        let handle = bind_handle(&mut inner, HandleKind::DataSet, Some("open_dataset"), binding)?;
        Ok(DataSet::bind(self, handle, name.to_string()))
    }

    pub(crate) fn dataset_exists_at(&self, parent: Handle, name: &str) -> Result<bool> {
        let inner = self.read_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        validate_simple_name(name, "dataset")?;
        Ok(child_id(&inner, parent_id, name)
            .is_some_and(|id| matches!(inner.objects.get(&id), Some(ObjectNode::Dataset(_)))))
    }

    pub(crate) fn delete_dataset_at(&self, parent: Handle, name: &str) -> Result<()> {
        let mut inner = self.write_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        require_writable(&inner, parent)?;
        validate_simple_name(name, "dataset")?;
        let id = child_id(&inner, parent_id, name)
            .filter(|id| matches!(inner.objects.get(id), Some(ObjectNode::Dataset(_))))
            .ok_or_else(|| StoreError::not_found("dataset", name))?;
        remove_child(&mut inner, parent_id, name);
        delete_subtree(&mut inner, id);
        Ok(())
    }

    // ---- named types ----------------------------------------------------

    pub(crate) fn commit_type_at(
        &self,
        parent: Handle,
        name: &str,
        dtype: &TypeDescriptor,
    ) -> Result<()> {
        let mut inner = self.write_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        require_writable(&inner, parent)?;
        validate_simple_name(name, "named type")?;
        if child_id(&inner, parent_id, name).is_some() {
            return Err(StoreError::DuplicateChild(name.to_string()));
        }
        let id = alloc_object(
            &mut inner,
            ObjectNode::NamedType(TypeNode {
                dtype: dtype.clone(),
                attrs: Vec::new(),
            }),
        );
        add_child(&mut inner, parent_id, name, id);
        debug!(name, "committed named type");
        Ok(())
    }

    pub(crate) fn open_named_type_at(&self, parent: Handle, name: &str) -> Result<TypeDescriptor> {
        let inner = self.read_lock();
        let parent_id = locate_object(&inner, parent, LOCATION_KINDS)?;
        validate_simple_name(name, "named type")?;
        let id = child_id(&inner, parent_id, name)
            .ok_or_else(|| StoreError::not_found("named type", name))?;
        match inner.objects.get(&id) {
            Some(ObjectNode::NamedType(node)) => Ok(node.dtype.clone()),
            _ => Err(StoreError::not_found("named type", name)),
        }
    }

    // ---- attributes ------------------------------------------------------

    pub(crate) fn create_attribute_at<'s>(
        &'s self,
        owner: Handle,
        name: &str,
        dtype: &TypeDescriptor,
        space: &SpaceDescriptor,
        plist: Option<&PropertyList>,
    ) -> Result<Attribute<'s>> {
        let mut inner = self.write_lock();
        let owner_id = locate_object(&inner, owner, ATTR_OWNER_KINDS)?;
        require_writable(&inner, owner)?;
        validate_simple_name(name, "attribute")?;
        if let Some(p) = plist {
            if p.class() != PropertyListClass::AttributeCreate {
                return Err(StoreError::WrongPropertyClass {
                    found: p.class(),
                    expected: PropertyListClass::AttributeCreate,
                });
            }
        }
        let node = inner
            .objects
            .get(&owner_id)
            .ok_or(StoreError::InvalidHandle(owner))?;
        if node.attrs().iter().any(|(n, _)| n == name) {
            return Err(StoreError::DuplicateChild(name.to_string()));
        }
        // Storage size is fixed at creation; variable-length elements start
        // as zero-length frames.
        let data = match dtype.byte_size() {
            Some(elem) => vec![0u8; elem * space.element_count() as usize],
            None => vec![0u8; 4 * space.element_count() as usize],
        };
        let entry = AttrEntry {
            dtype: dtype.clone(),
            space: space.clone(),
            data,
        };
        inner
            .objects
            .get_mut(&owner_id)
            .ok_or(StoreError::InvalidHandle(owner))?
            .attrs_mut()
            .push((name.to_string(), entry));
        let binding = child_binding(
            &inner,
            owner,
            Target::Attribute {
                owner: owner_id,
                name: name.to_string(),
            },
        )?;
        let handle = bind_handle(
            &mut inner,
            HandleKind::Attribute,
            Some("create_attribute"),
            binding,
        )?;
        debug!(name, %handle, "created attribute");
        Ok(Attribute::bind(self, handle, name.to_string()))
    }

    pub(crate) fn open_attribute_at<'s>(
        &'s self,
        owner: Handle,
        name: &str,
    ) -> Result<Attribute<'s>> {
        let mut inner = self.write_lock();
        let owner_id = locate_object(&inner, owner, ATTR_OWNER_KINDS)?;
        validate_simple_name(name, "attribute")?;
        let node = inner
            .objects
            .get(&owner_id)
            .ok_or(StoreError::InvalidHandle(owner))?;
        if !node.attrs().iter().any(|(n, _)| n == name) {
            return Err(StoreError::not_found("attribute", name));
        }
        let binding = child_binding(
            &inner,
            owner,
            Target::Attribute {
                owner: owner_id,
                name: name.to_string(),
            },
        )?;
        let handle = bind_handle(
            &mut inner,
            HandleKind::Attribute,
            Some("open_attribute"),
            binding,
        )?;
        Ok(Attribute::bind(self, handle, name.to_string()))
    }

    pub(crate) fn delete_attribute_at(&self, owner: Handle, name: &str) -> Result<()> {
        let mut inner = self.write_lock();
        let owner_id = locate_object(&inner, owner, ATTR_OWNER_KINDS)?;
        require_writable(&inner, owner)?;
        validate_simple_name(name, "attribute")?;
        let node = inner
            .objects
            .get_mut(&owner_id)
            .ok_or(StoreError::InvalidHandle(owner))?;
        let attrs = node.attrs_mut();
        let pos = attrs
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| StoreError::not_found("attribute", name))?;
        attrs.remove(pos);
        debug!(name, "deleted attribute");
        Ok(())
    }

    pub(crate) fn attribute_exists_at(&self, owner: Handle, name: &str) -> Result<bool> {
        let inner = self.read_lock();
        let owner_id = locate_object(&inner, owner, ATTR_OWNER_KINDS)?;
        validate_simple_name(name, "attribute")?;
        let node = inner
            .objects
            .get(&owner_id)
            .ok_or(StoreError::InvalidHandle(owner))?;
        Ok(node.attrs().iter().any(|(n, _)| n == name))
    }

    pub(crate) fn list_attribute_names_at(&self, owner: Handle) -> Result<Vec<String>> {
        let inner = self.read_lock();
        let owner_id = locate_object(&inner, owner, ATTR_OWNER_KINDS)?;
        let node = inner
            .objects
            .get(&owner_id)
            .ok_or(StoreError::InvalidHandle(owner))?;
        Ok(node.attrs().iter().map(|(n, _)| n.clone()).collect())
    }

    pub(crate) fn attribute_write(&self, handle: Handle, value: &Value) -> Result<()> {
        let mut inner = self.write_lock();
        inner.registry.assert_kind(handle, &[HandleKind::Attribute])?;
        require_writable(&inner, handle)?;
        let (owner, name) = attribute_target(&inner, handle)?;
        let entry = attr_entry(&inner, handle, owner, &name)?;
        let bytes = codec::encode(value, &entry.dtype, &entry.space)?;
        let entry = attr_entry_mut(&mut inner, handle, owner, &name)?;
        entry.data = bytes;
        Ok(())
    }

    pub(crate) fn attribute_write_truncated(&self, handle: Handle, s: &str) -> Result<()> {
        let mut inner = self.write_lock();
        inner.registry.assert_kind(handle, &[HandleKind::Attribute])?;
        require_writable(&inner, handle)?;
        let (owner, name) = attribute_target(&inner, handle)?;
        let entry = attr_entry(&inner, handle, owner, &name)?;
        let bytes = codec::encode_string_truncated(s, &entry.dtype, &entry.space)?;
        let entry = attr_entry_mut(&mut inner, handle, owner, &name)?;
        entry.data = bytes;
        Ok(())
    }

    pub(crate) fn attribute_read(&self, handle: Handle) -> Result<Value> {
        let inner = self.read_lock();
        inner.registry.assert_kind(handle, &[HandleKind::Attribute])?;
        let (owner, name) = attribute_target(&inner, handle)?;
        let entry = attr_entry(&inner, handle, owner, &name)?;
        codec::decode(&entry.data, &entry.dtype, &entry.space)
    }

    pub(crate) fn attribute_raw(&self, handle: Handle) -> Result<Vec<u8>> {
        let inner = self.read_lock();
        inner.registry.assert_kind(handle, &[HandleKind::Attribute])?;
        let (owner, name) = attribute_target(&inner, handle)?;
        Ok(attr_entry(&inner, handle, owner, &name)?.data.clone())
    }

    pub(crate) fn attribute_type(&self, handle: Handle) -> Result<TypeDescriptor> {
        let inner = self.read_lock();
        inner.registry.assert_kind(handle, &[HandleKind::Attribute])?;
        let (owner, name) = attribute_target(&inner, handle)?;
        Ok(attr_entry(&inner, handle, owner, &name)?.dtype.clone())
    }

    pub(crate) fn attribute_space(&self, handle: Handle) -> Result<SpaceDescriptor> {
        let inner = self.read_lock();
        inner.registry.assert_kind(handle, &[HandleKind::Attribute])?;
        let (owner, name) = attribute_target(&inner, handle)?;
        Ok(attr_entry(&inner, handle, owner, &name)?.space.clone())
    }

    // ---- dataset engine access (used by `DataSet`) ----------------------

    pub(crate) fn with_dataset<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&TypeDescriptor, &SpaceDescriptor, &[u8]) -> Result<R>,
    ) -> Result<R> {
        let inner = self.read_lock();
        inner.registry.assert_kind(handle, &[HandleKind::DataSet])?;
        let id = target_object(&inner, handle)?;
        match inner.objects.get(&id) {
            Some(ObjectNode::Dataset(node)) => f(&node.dtype, &node.space, &node.data),
            _ => Err(StoreError::InvalidHandle(handle)),
        }
    }

    pub(crate) fn with_dataset_mut<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut DatasetState<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut inner = self.write_lock();
        inner.registry.assert_kind(handle, &[HandleKind::DataSet])?;
        require_writable(&inner, handle)?;
        let id = target_object(&inner, handle)?;
        match inner.objects.get_mut(&id) {
            Some(ObjectNode::Dataset(node)) => {
                let mut state = DatasetState {
                    dtype: &node.dtype,
                    space: &mut node.space,
                    data: &mut node.data,
                    chunk_dims: node.chunk_dims.as_deref(),
                };
                f(&mut state)
            }
            _ => Err(StoreError::InvalidHandle(handle)),
        }
    }

    pub(crate) fn dataset_compression(&self, handle: Handle) -> Result<Option<u32>> {
        let inner = self.read_lock();
        inner.registry.assert_kind(handle, &[HandleKind::DataSet])?;
        let id = target_object(&inner, handle)?;
        match inner.objects.get(&id) {
            Some(ObjectNode::Dataset(node)) => Ok(node.compression),
            _ => Err(StoreError::InvalidHandle(handle)),
        }
    }

    pub(crate) fn dataset_chunk_dims(&self, handle: Handle) -> Result<Option<Vec<u64>>> {
        let inner = self.read_lock();
        inner.registry.assert_kind(handle, &[HandleKind::DataSet])?;
        let id = target_object(&inner, handle)?;
        match inner.objects.get(&id) {
            Some(ObjectNode::Dataset(node)) => Ok(node.chunk_dims.clone()),
            _ => Err(StoreError::InvalidHandle(handle)),
        }
    }

    // ---- diagnostics ----------------------------------------------------

    pub(crate) fn object_count_for(
        &self,
        file: Handle,
        filter: Option<HandleKind>,
    ) -> Result<u64> {
        let inner = self.read_lock();
        inner.registry.assert_kind(file, &[HandleKind::File])?;
        let root = inner
            .bindings
            .get(&file.raw())
            .ok_or(StoreError::InvalidHandle(file))?
            .file_root;
        let mut count = 0u64;
        for (raw, binding) in &inner.bindings {
            if binding.file_root != root {
                continue;
            }
            let kind = inner.registry.kind_of(Handle(*raw))?;
            if filter.is_none() || filter == Some(kind) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().expect("store lock poisoned")
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.read() {
            if inner.registry.open_count() > 0 {
                inner.registry.warn_leaks();
            }
        }
    }
}

/// Mutable view of one dataset's storage, handed to `DataSet` operations.
pub(crate) struct DatasetState<'a> {
    pub dtype: &'a TypeDescriptor,
    pub space: &'a mut SpaceDescriptor,
    pub data: &'a mut Vec<u8>,
    pub chunk_dims: Option<&'a [u64]>,
}

// ---- engine internals ----------------------------------------------------

fn alloc_object(inner: &mut StoreInner, node: ObjectNode) -> ObjectId {
    let id = inner.next_object;
    inner.next_object += 1;
    inner.objects.insert(id, node);
    id
}

fn bind_handle(
    inner: &mut StoreInner,
    kind: HandleKind,
    tag: Option<&'static str>,
    binding: Binding,
) -> Result<Handle> {
    let handle = Handle(inner.next_handle);
    inner.next_handle += 1;
    inner.registry.register(handle, kind, tag)?;
    inner.bindings.insert(handle.raw(), binding);
    Ok(handle)
}

/// Builds the binding for a child opened through `parent`, inheriting the
/// parent's file root and access mode.
fn child_binding(inner: &StoreInner, parent: Handle, target: Target) -> Result<Binding> {
    let parent_binding = inner
        .bindings
        .get(&parent.raw())
        .ok_or(StoreError::InvalidHandle(parent))?;
    Ok(Binding {
        target,
        file_root: parent_binding.file_root,
        read_only: parent_binding.read_only,
        store_name: parent_binding.store_name.clone(),
    })
}

/// Resolves a handle to its arena object, asserting kind and liveness first.
fn locate_object(inner: &StoreInner, handle: Handle, allowed: &[HandleKind]) -> Result<ObjectId> {
    inner.registry.assert_kind(handle, allowed)?;
    let id = target_object(inner, handle)?;
    if !inner.objects.contains_key(&id) {
        // Target was deleted out from under a still-open handle.
        return Err(StoreError::InvalidHandle(handle));
    }
    Ok(id)
}

fn target_object(inner: &StoreInner, handle: Handle) -> Result<ObjectId> {
    match inner.bindings.get(&handle.raw()) {
        Some(Binding {
            target: Target::Object(id),
            ..
        }) => Ok(*id),
        _ => Err(StoreError::InvalidHandle(handle)),
    }
}

fn attribute_target(inner: &StoreInner, handle: Handle) -> Result<(ObjectId, String)> {
    match inner.bindings.get(&handle.raw()) {
        Some(Binding {
            target: Target::Attribute { owner, name },
            ..
        }) => Ok((*owner, name.clone())),
        _ => Err(StoreError::InvalidHandle(handle)),
    }
}

fn attr_entry<'a>(
    inner: &'a StoreInner,
    handle: Handle,
    owner: ObjectId,
    name: &str,
) -> Result<&'a AttrEntry> {
    inner
        .objects
        .get(&owner)
        .and_then(|node| node.attrs().iter().find(|(n, _)| n == name))
        .map(|(_, e)| e)
        .ok_or(StoreError::InvalidHandle(handle))
}

fn attr_entry_mut<'a>(
    inner: &'a mut StoreInner,
    handle: Handle,
    owner: ObjectId,
    name: &str,
) -> Result<&'a mut AttrEntry> {
    inner
        .objects
        .get_mut(&owner)
        .and_then(|node| node.attrs_mut().iter_mut().find(|(n, _)| n == name))
        .map(|(_, e)| e)
        .ok_or(StoreError::InvalidHandle(handle))
}

fn require_writable(inner: &StoreInner, handle: Handle) -> Result<()> {
    let binding = inner
        .bindings
        .get(&handle.raw())
        .ok_or(StoreError::InvalidHandle(handle))?;
    if binding.read_only {
        return Err(StoreError::ReadOnly(binding.store_name.clone()));
    }
    Ok(())
}

fn group_node<'a>(inner: &'a StoreInner, handle: Handle, id: ObjectId) -> Result<&'a GroupNode> {
    match inner.objects.get(&id) {
        Some(ObjectNode::Group(g)) => Ok(g),
        _ => Err(StoreError::InvalidHandle(handle)),
    }
}

fn child_id(inner: &StoreInner, parent: ObjectId, name: &str) -> Option<ObjectId> {
    match inner.objects.get(&parent) {
        Some(ObjectNode::Group(g)) => g
            .children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id),
        _ => None,
    }
}

fn add_child(inner: &mut StoreInner, parent: ObjectId, name: &str, id: ObjectId) {
    if let Some(ObjectNode::Group(g)) = inner.objects.get_mut(&parent) {
        g.children.push((name.to_string(), id));
    }
}

fn remove_child(inner: &mut StoreInner, parent: ObjectId, name: &str) {
    if let Some(ObjectNode::Group(g)) = inner.objects.get_mut(&parent) {
        g.children.retain(|(n, _)| n != name);
    }
}

/// Removes an object and everything beneath it from the arena. Handles still
/// pointing in are left to fail with `InvalidHandle` on use.
fn delete_subtree(inner: &mut StoreInner, root: ObjectId) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(node) = inner.objects.remove(&id) {
            if let ObjectNode::Group(g) = node {
                stack.extend(g.children.iter().map(|(_, id)| *id));
            }
        }
    }
}

fn validate_simple_name(name: &str, what: &'static str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::EmptyName(what));
    }
    if name.contains('/') {
        return Err(StoreError::invalid_name(
            name,
            "path separator in simple name",
        ));
    }
    Ok(())
}

// ---- wrapper objects -----------------------------------------------------

/// Common surface of any handle-bearing wrapper object.
///
/// The `'s` parameter is the store borrow: wrappers created through these
/// traits borrow only the [`Store`], never their parent wrapper, so a parent
/// can be closed or dropped while its children stay open.
pub trait ObjectHandle<'s> {
    /// The engine this object belongs to.
    fn store(&self) -> &'s Store;

    /// This object's handle.
    fn handle(&self) -> Handle;
}

/// Attribute operations, available on files, groups, datasets, and named
/// types.
pub trait AttributeHost<'s>: ObjectHandle<'s> {
    /// Creates an attribute with fixed type and shape.
    fn create_attribute(
        &self,
        name: &str,
        dtype: &TypeDescriptor,
        space: &SpaceDescriptor,
    ) -> Result<Attribute<'s>> {
        self.store()
            .create_attribute_at(self.handle(), name, dtype, space, None)
    }

    /// Creates an attribute with creation options.
    fn create_attribute_with(
        &self,
        name: &str,
        dtype: &TypeDescriptor,
        space: &SpaceDescriptor,
        plist: &PropertyList,
    ) -> Result<Attribute<'s>> {
        self.store()
            .create_attribute_at(self.handle(), name, dtype, space, Some(plist))
    }

    /// Opens an existing attribute.
    fn open_attribute(&self, name: &str) -> Result<Attribute<'s>> {
        self.store().open_attribute_at(self.handle(), name)
    }

    /// Deletes an attribute by name.
    fn delete_attribute(&self, name: &str) -> Result<()> {
        self.store().delete_attribute_at(self.handle(), name)
    }

    /// Returns true if an attribute with this name exists.
    fn attribute_exists(&self, name: &str) -> Result<bool> {
        self.store().attribute_exists_at(self.handle(), name)
    }

    /// Lists attribute names in insertion order.
    fn list_attribute_names(&self) -> Result<Vec<String>> {
        self.store().list_attribute_names_at(self.handle())
    }
}

/// Hierarchical namespace operations, available on files and groups.
pub trait Location<'s>: AttributeHost<'s> {
    /// Creates a child group. The name must be simple (no path separators).
    fn create_group(&self, name: &str) -> Result<Group<'s>> {
        self.store().create_group_at(self.handle(), name)
    }

    /// Opens an existing child group.
    fn open_group(&self, name: &str) -> Result<Group<'s>> {
        self.store().open_group_at(self.handle(), name)
    }

    /// Deletes a child group and everything beneath it.
    fn delete_group(&self, name: &str) -> Result<()> {
        self.store().delete_group_at(self.handle(), name)
    }

    /// Returns true if a child group with this simple name exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] if `name` contains a path
    /// separator; use [`Location::group_path_exists`] for multi-segment
    /// paths.
    fn group_exists(&self, name: &str) -> Result<bool> {
        self.store().group_exists_at(self.handle(), name)
    }

    /// Resolves a multi-segment path of groups. Returns `false`, never an
    /// error, when any intermediate segment is missing.
    fn group_path_exists(&self, path: &str) -> Result<bool> {
        self.store().group_path_exists_at(self.handle(), path)
    }

    /// Enumerates immediate children in insertion order.
    fn list_children(&self) -> Result<Vec<(String, ChildKind)>> {
        self.store().list_children_at(self.handle())
    }

    /// Creates a dataset with fixed type and shape.
    fn create_data_set(
        &self,
        name: &str,
        dtype: &TypeDescriptor,
        space: &SpaceDescriptor,
    ) -> Result<DataSet<'s>> {
        self.store()
            .create_dataset_at(self.handle(), name, dtype, space, None)
    }

    /// Creates a dataset with creation options (chunking, compression).
    fn create_data_set_with(
        &self,
        name: &str,
        dtype: &TypeDescriptor,
        space: &SpaceDescriptor,
        plist: &PropertyList,
    ) -> Result<DataSet<'s>> {
        self.store()
            .create_dataset_at(self.handle(), name, dtype, space, Some(plist))
    }

    /// Opens an existing dataset.
    fn open_data_set(&self, name: &str) -> Result<DataSet<'s>> {
        self.store().open_dataset_at(self.handle(), name)
    }

    /// Returns true if a dataset with this name exists.
    fn data_set_exists(&self, name: &str) -> Result<bool> {
        self.store().dataset_exists_at(self.handle(), name)
    }

    /// Deletes a dataset by name.
    fn delete_data_set(&self, name: &str) -> Result<()> {
        self.store().delete_dataset_at(self.handle(), name)
    }

    /// Commits a type under this location; it appears in
    /// [`Location::list_children`] as [`ChildKind::NamedType`].
    fn commit_type(&self, name: &str, dtype: &TypeDescriptor) -> Result<()> {
        self.store().commit_type_at(self.handle(), name, dtype)
    }

    /// Opens a committed named type.
    fn open_named_type(&self, name: &str) -> Result<TypeDescriptor> {
        self.store().open_named_type_at(self.handle(), name)
    }
}

/// An open file: the root of one backing store's namespace.
#[derive(Debug)]
pub struct File<'s> {
    store: &'s Store,
    handle: Handle,
    name: String,
    open: bool,
}

impl<'s> File<'s> {
    /// Backing store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counts open handles associated with this file across all kinds, or
    /// only those of `filter`'s kind. Used for leak and lifecycle assertions.
    pub fn object_count(&self, filter: Option<HandleKind>) -> Result<u64> {
        self.store.object_count_for(self.handle, filter)
    }

    /// Closes this file handle. Handles to children stay open independently.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyClosed`] on a second call.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(StoreError::AlreadyClosed(self.handle));
        }
        self.store.close_handle(self.handle)?;
        self.open = false;
        Ok(())
    }
}

impl<'s> ObjectHandle<'s> for File<'s> {
    fn store(&self) -> &'s Store {
        self.store
    }

    fn handle(&self) -> Handle {
        self.handle
    }
}

impl<'s> AttributeHost<'s> for File<'s> {}
impl<'s> Location<'s> for File<'s> {}

impl Drop for File<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.store.close_handle(self.handle);
        }
    }
}

/// An open group inside a file.
#[derive(Debug)]
pub struct Group<'s> {
    store: &'s Store,
    handle: Handle,
    name: String,
    open: bool,
}

impl<'s> Group<'s> {
    /// Simple name of this group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Closes this group handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyClosed`] on a second call.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(StoreError::AlreadyClosed(self.handle));
        }
        self.store.close_handle(self.handle)?;
        self.open = false;
        Ok(())
    }
}

impl<'s> ObjectHandle<'s> for Group<'s> {
    fn store(&self) -> &'s Store {
        self.store
    }

    fn handle(&self) -> Handle {
        self.handle
    }
}

impl<'s> AttributeHost<'s> for Group<'s> {}
impl<'s> Location<'s> for Group<'s> {}

impl Drop for Group<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.store.close_handle(self.handle);
        }
    }
}
