use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueFormat {
    Char,
    Int8,
    Int16,
    Int32,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaDataValue {
    Char(Vec<String>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Float(Vec<f64>),
}

impl MetaDataValue {
    pub fn format(&self) -> ValueFormat {
        match self {
            MetaDataValue::Char(_) => ValueFormat::Char,
            MetaDataValue::Int8(_) => ValueFormat::Int8,
            MetaDataValue::Int16(_) => ValueFormat::Int16,
            MetaDataValue::Int32(_) => ValueFormat::Int32,
            MetaDataValue::Float(_) => ValueFormat::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MetaDataValue::Char(v) => v.len(),
            MetaDataValue::Int8(v) => v.len(),
            MetaDataValue::Int16(v) => v.len(),
            MetaDataValue::Int32(v) => v.len(),
            MetaDataValue::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed leaf value with its array shape.
///
/// For numeric values the product of the dimensions equals the number of
/// values (no dimension means a scalar). For strings the first dimension is
/// the fixed string width and the remaining ones count the strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaDataInfo {
    value: MetaDataValue,
    dimensions: Vec<usize>,
}

fn expected_len(format: ValueFormat, dimensions: &[usize]) -> usize {
    match format {
        ValueFormat::Char if dimensions.is_empty() => 1,
        ValueFormat::Char => dimensions[1..].iter().product(),
        _ => dimensions.iter().product(),
    }
}

impl MetaDataInfo {
    pub fn new(value: MetaDataValue, dimensions: Vec<usize>) -> Result<Self> {
        let expected = expected_len(value.format(), &dimensions);
        if expected != value.len() {
            return Err(Error::invalid_argument(format!(
                "metadata dimensions {dimensions:?} describe {expected} values, got {}",
                value.len()
            )));
        }
        Ok(Self { value, dimensions })
    }

    fn vector(value: MetaDataValue) -> Self {
        let dimensions = vec![value.len()];
        Self { value, dimensions }
    }

    fn scalar(value: MetaDataValue) -> Self {
        Self {
            value,
            dimensions: Vec::new(),
        }
    }

    pub fn int8(value: i8) -> Self {
        Self::scalar(MetaDataValue::Int8(vec![value]))
    }

    pub fn int16(value: i16) -> Self {
        Self::scalar(MetaDataValue::Int16(vec![value]))
    }

    pub fn int32(value: i32) -> Self {
        Self::scalar(MetaDataValue::Int32(vec![value]))
    }

    pub fn float(value: f64) -> Self {
        Self::scalar(MetaDataValue::Float(vec![value]))
    }

    pub fn int8s(values: Vec<i8>) -> Self {
        Self::vector(MetaDataValue::Int8(values))
    }

    pub fn int16s(values: Vec<i16>) -> Self {
        Self::vector(MetaDataValue::Int16(values))
    }

    pub fn int32s(values: Vec<i32>) -> Self {
        Self::vector(MetaDataValue::Int32(values))
    }

    pub fn floats(values: Vec<f64>) -> Self {
        Self::vector(MetaDataValue::Float(values))
    }

    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        let width = value.chars().count();
        Self {
            value: MetaDataValue::Char(vec![value]),
            dimensions: vec![width],
        }
    }

    /// Strings padded to the width of the longest one.
    pub fn strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let width = values.iter().map(|s| s.chars().count()).max().unwrap_or(0);
        let count = values.len();
        Self {
            value: MetaDataValue::Char(values),
            dimensions: vec![width, count],
        }
    }

    /// Reshapes the value, e.g. a flat list of corners into `[3, 4, n]`.
    pub fn reshaped(self, dimensions: Vec<usize>) -> Result<Self> {
        Self::new(self.value, dimensions)
    }

    pub fn value(&self) -> &MetaDataValue {
        &self.value
    }

    pub fn format(&self) -> ValueFormat {
        self.value.format()
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Numeric view. Strings that do not parse become 0.
    pub fn to_f64s(&self) -> Vec<f64> {
        match &self.value {
            MetaDataValue::Char(v) => v.iter().map(|s| s.trim().parse().unwrap_or(0.0)).collect(),
            MetaDataValue::Int8(v) => v.iter().map(|x| f64::from(*x)).collect(),
            MetaDataValue::Int16(v) => v.iter().map(|x| f64::from(*x)).collect(),
            MetaDataValue::Int32(v) => v.iter().map(|x| f64::from(*x)).collect(),
            MetaDataValue::Float(v) => v.clone(),
        }
    }

    /// Integer view. Floats are truncated toward zero.
    pub fn to_i32s(&self) -> Vec<i32> {
        match &self.value {
            MetaDataValue::Char(v) => v.iter().map(|s| s.trim().parse().unwrap_or(0)).collect(),
            MetaDataValue::Int8(v) => v.iter().map(|x| i32::from(*x)).collect(),
            MetaDataValue::Int16(v) => v.iter().map(|x| i32::from(*x)).collect(),
            MetaDataValue::Int32(v) => v.clone(),
            MetaDataValue::Float(v) => v.iter().map(|x| *x as i32).collect(),
        }
    }

    pub fn to_strings(&self) -> Vec<String> {
        match &self.value {
            MetaDataValue::Char(v) => v.iter().map(|s| s.trim_end().to_owned()).collect(),
            MetaDataValue::Int8(v) => v.iter().map(ToString::to_string).collect(),
            MetaDataValue::Int16(v) => v.iter().map(ToString::to_string).collect(),
            MetaDataValue::Int32(v) => v.iter().map(ToString::to_string).collect(),
            MetaDataValue::Float(v) => v.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn first_f64(&self) -> Option<f64> {
        self.to_f64s().into_iter().next()
    }

    pub fn first_i32(&self) -> Option<i32> {
        self.to_i32s().into_iter().next()
    }

    pub fn first_string(&self) -> Option<String> {
        self.to_strings().into_iter().next()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Content {
    Info(MetaDataInfo),
    Children(Vec<MetaData>),
}

/// Node of the metadata tree: either a typed leaf or an ordered list of
/// uniquely labelled children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    label: String,
    description: String,
    unlocked: bool,
    content: Content,
}

impl MetaData {
    pub fn group(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            unlocked: true,
            content: Content::Children(Vec::new()),
        }
    }

    pub fn leaf(label: impl Into<String>, info: MetaDataInfo) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            unlocked: true,
            content: Content::Info(info),
        }
    }

    pub fn root() -> Self {
        Self::group("ROOT")
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn set_unlocked(&mut self, unlocked: bool) {
        self.unlocked = unlocked;
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, Content::Info(_))
    }

    pub fn info(&self) -> Option<&MetaDataInfo> {
        match &self.content {
            Content::Info(info) => Some(info),
            Content::Children(_) => None,
        }
    }

    pub fn children(&self) -> &[MetaData] {
        match &self.content {
            Content::Children(children) => children,
            Content::Info(_) => &[],
        }
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, label: &str) -> Option<&MetaData> {
        self.children().iter().find(|c| c.label == label)
    }

    pub fn child_mut(&mut self, label: &str) -> Option<&mut MetaData> {
        match &mut self.content {
            Content::Children(children) => children.iter_mut().find(|c| c.label == label),
            Content::Info(_) => None,
        }
    }

    fn children_vec(&mut self) -> Result<&mut Vec<MetaData>> {
        match &mut self.content {
            Content::Children(children) => Ok(children),
            Content::Info(_) => Err(Error::logic(format!(
                "metadata '{}' holds a value and cannot have children",
                self.label
            ))),
        }
    }

    /// Appends `child`. Returns `false`, leaving the tree untouched, when a
    /// sibling already uses the same label.
    pub fn append_child(&mut self, child: MetaData) -> Result<bool> {
        let len = self.child_count();
        self.insert_child(len, child)
    }

    pub fn insert_child(&mut self, index: usize, child: MetaData) -> Result<bool> {
        let children = self.children_vec()?;
        if children.iter().any(|c| c.label == child.label) {
            return Ok(false);
        }
        if index > children.len() {
            return Err(Error::out_of_range(format!(
                "cannot insert metadata at position {index} of {}",
                children.len()
            )));
        }
        children.insert(index, child);
        Ok(true)
    }

    /// Renames the child `old`. Returns `false`, leaving the tree untouched,
    /// when another sibling already uses `new`.
    pub fn rename_child(&mut self, old: &str, new: &str) -> Result<bool> {
        let parent = self.label.clone();
        let children = self.children_vec()?;
        if old != new && children.iter().any(|c| c.label == new) {
            return Ok(false);
        }
        let child = children.iter_mut().find(|c| c.label == old).ok_or_else(|| {
            Error::invalid_argument(format!("metadata '{parent}' has no child '{old}'"))
        })?;
        child.label = new.to_owned();
        Ok(true)
    }

    pub fn remove_child(&mut self, label: &str) -> Option<MetaData> {
        match &mut self.content {
            Content::Children(children) => {
                let index = children.iter().position(|c| c.label == label)?;
                Some(children.remove(index))
            }
            Content::Info(_) => None,
        }
    }

    /// Looks up a descendant by dotted path, e.g. `"FORCE_PLATFORM.CHANNEL"`.
    pub fn find(&self, path: &str) -> Option<&MetaData> {
        path.split('.')
            .try_fold(self, |node, label| node.child(label))
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut MetaData> {
        let mut node = self;
        for label in path.split('.') {
            node = node.child_mut(label)?;
        }
        Some(node)
    }

    /// Shortcut for the leaf value at `path`.
    pub fn find_info(&self, path: &str) -> Option<&MetaDataInfo> {
        self.find(path).and_then(MetaData::info)
    }

    pub fn find_or_create_group(&mut self, label: &str) -> Result<&mut MetaData> {
        let children = self.children_vec()?;
        let index = match children.iter().position(|c| c.label == label) {
            Some(index) => index,
            None => {
                children.push(MetaData::group(label));
                children.len() - 1
            }
        };
        Ok(&mut children[index])
    }

    /// Stores `info` at `path`, creating intermediate groups as needed and
    /// replacing any existing leaf.
    pub fn set_info(&mut self, path: &str, info: MetaDataInfo) -> Result<()> {
        let (parent, label) = match path.rsplit_once('.') {
            Some((parent, label)) => (Some(parent), label),
            None => (None, path),
        };
        if label.is_empty() {
            return Err(Error::invalid_argument("metadata label cannot be empty"));
        }

        let mut node = self;
        if let Some(parent) = parent {
            for group in parent.split('.') {
                node = node.find_or_create_group(group)?;
            }
        }

        let children = node.children_vec()?;
        match children.iter_mut().find(|c| c.label == label) {
            Some(existing) => existing.content = Content::Info(info),
            None => children.push(MetaData::leaf(label, info)),
        }
        Ok(())
    }

    /// Every node below this one as `(dotted path, node)`, depth first.
    pub fn walk(&self) -> Vec<(String, &MetaData)> {
        let mut out = Vec::new();
        for child in self.children() {
            collect(child, child.label.clone(), &mut out);
        }
        out
    }
}

fn collect<'a>(node: &'a MetaData, path: String, out: &mut Vec<(String, &'a MetaData)>) {
    out.push((path.clone(), node));
    for child in node.children() {
        collect(child, format!("{path}.{}", child.label), out);
    }
}

impl Default for MetaData {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, node) in self.walk() {
            match node.info() {
                Some(info) => writeln!(f, "{path} = {:?}", info.to_strings())?,
                None => writeln!(f, "{path}")?,
            }
        }
        Ok(())
    }
}
