//! Arena of entities with relationship references.
//!
//! Relationship properties hold [`EntityId`]s into the arena instead of
//! nested copies, so an entity can point back at its parent without
//! infinite duplication. Nested JSON is produced on demand with
//! [`EntityGraph::to_json`].

use std::collections::BTreeMap;
use std::ops::Index;

use serde_json::Value;

use crate::error::OrmError;
use crate::schema::{RelationshipKind, Schema};
use crate::value::Row;

/// Handle of an entity inside one [`EntityGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }

    fn shifted(self, base: usize) -> Self {
        EntityId(self.0 + base)
    }
}

/// Value of a relationship property
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Many-to-one: the related entity or `None`
    One(Option<EntityId>),
    /// One-to-many: related entities in row order
    Many(Vec<EntityId>),
}

impl Related {
    pub fn ids(&self) -> Vec<EntityId> {
        match self {
            Related::One(id) => id.iter().copied().collect(),
            Related::Many(ids) => ids.clone(),
        }
    }

    fn shifted(&self, base: usize) -> Self {
        match self {
            Related::One(id) => Related::One(id.map(|id| id.shifted(base))),
            Related::Many(ids) => Related::Many(ids.iter().map(|id| id.shifted(base)).collect()),
        }
    }
}

/// One row or instance plus its populated relationships
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Table the entity belongs to
    pub table: String,
    /// Column values (row side) or property values (instance side)
    pub fields: Row,
    /// Populated relationship properties
    pub relations: BTreeMap<String, Related>,
}

impl Entity {
    pub fn new(table: impl Into<String>, fields: Row) -> Self {
        Self {
            table: table.into(),
            fields,
            relations: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn related(&self, relationship: &str) -> Option<&Related> {
        self.relations.get(relationship)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityGraph {
    entities: Vec<Entity>,
}

impl Index<EntityId> for EntityGraph {
    type Output = Entity;

    fn index(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) -> EntityId {
        self.entities.push(entity);
        EntityId(self.entities.len() - 1)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId(i), e))
    }

    /// Set a relationship property, replacing any previous value
    pub fn set_related(&mut self, id: EntityId, relationship: &str, related: Related) {
        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.relations.insert(relationship.to_string(), related);
        }
    }

    /// Move every entity of `other` into this graph and return the new ids
    /// of `roots`.
    pub fn absorb(&mut self, other: EntityGraph, roots: &[EntityId]) -> Vec<EntityId> {
        let base = self.entities.len();
        for mut entity in other.entities {
            for related in entity.relations.values_mut() {
                *related = related.shifted(base);
            }
            self.entities.push(entity);
        }
        roots.iter().map(|id| id.shifted(base)).collect()
    }

    /// Render an entity and everything reachable from it as nested JSON.
    ///
    /// Entities reachable along several paths are rendered once per path.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::CyclicGraph` if the entity reaches itself.
    pub fn to_json(&self, id: EntityId) -> Result<Value, OrmError> {
        let mut visiting = Vec::new();
        self.render(id, &mut visiting)
    }

    /// Render several entities as a JSON array
    pub fn to_json_list(&self, ids: &[EntityId]) -> Result<Value, OrmError> {
        ids.iter()
            .map(|id| self.to_json(*id))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn render(&self, id: EntityId, visiting: &mut Vec<EntityId>) -> Result<Value, OrmError> {
        let entity = self
            .get(id)
            .ok_or_else(|| OrmError::InvalidEntity(format!("Entity {} is not in the graph", id.0)))?;
        if visiting.contains(&id) {
            return Err(OrmError::CyclicGraph {
                table: entity.table.clone(),
            });
        }
        visiting.push(id);

        let mut object = entity.fields.clone();
        for (name, related) in &entity.relations {
            let value = match related {
                Related::One(None) => Value::Null,
                Related::One(Some(other)) => self.render(*other, visiting)?,
                Related::Many(others) => Value::Array(
                    others
                        .iter()
                        .map(|other| self.render(*other, visiting))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            object.insert(name.clone(), value);
        }

        visiting.pop();
        Ok(Value::Object(object))
    }

    /// Build a graph from a nested JSON object of the given table.
    ///
    /// Keys naming a relationship of the table become relationship
    /// references; every other key is kept as a field.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownTable` for unregistered tables and
    /// `OrmError::InvalidEntity` if a value does not fit the declared shape.
    pub fn from_json(schema: &Schema, table: &str, value: &Value) -> Result<(Self, EntityId), OrmError> {
        let mut graph = Self::new();
        let id = graph.add_json(schema, table, value)?;
        Ok((graph, id))
    }

    /// Build a graph from a JSON array of objects of the given table
    pub fn from_json_list(
        schema: &Schema,
        table: &str,
        value: &Value,
    ) -> Result<(Self, Vec<EntityId>), OrmError> {
        let Value::Array(items) = value else {
            return Err(OrmError::InvalidEntity(format!("Expected an array of '{table}' objects")));
        };
        let mut graph = Self::new();
        let ids = items
            .iter()
            .map(|item| graph.add_json(schema, table, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((graph, ids))
    }

    fn add_json(&mut self, schema: &Schema, table_name: &str, value: &Value) -> Result<EntityId, OrmError> {
        let table = schema.get_table(table_name)?;
        let Value::Object(object) = value else {
            return Err(OrmError::InvalidEntity(format!(
                "Expected an object for table '{table_name}', got {value}"
            )));
        };

        let id = self.insert(Entity::new(table_name, Row::new()));
        let mut fields = Row::new();
        let mut relations = BTreeMap::new();

        for (key, field) in object {
            let Some(relationship) = table.relationship(key) else {
                fields.insert(key.clone(), field.clone());
                continue;
            };
            let other_table = relationship.other_table.as_str();
            let related = match (relationship.kind, field) {
                (RelationshipKind::ManyToOne, Value::Null) => Related::One(None),
                (RelationshipKind::ManyToOne, Value::Object(_)) => {
                    Related::One(Some(self.add_json(schema, other_table, field)?))
                }
                (RelationshipKind::OneToMany, Value::Array(items)) => Related::Many(
                    items
                        .iter()
                        .map(|item| self.add_json(schema, other_table, item))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                _ => {
                    return Err(OrmError::InvalidEntity(format!(
                        "Relationship '{table_name}.{key}' does not accept {field}"
                    )))
                }
            };
            relations.insert(key.clone(), related);
        }

        if let Some(entity) = self.entities.get_mut(id.0) {
            entity.fields = fields;
            entity.relations = relations;
        }
        Ok(id)
    }
}
