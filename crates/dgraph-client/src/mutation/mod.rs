//! Mutation constructors.

use serde::Serialize;

use dgraph_proto::api::{value, Mutation, NQuad, Value};

use crate::error::ClientResult;

/// Object value that matches every value of a predicate in a deletion.
pub const STAR_ALL: &str = "_STAR_ALL";

/// Returns a copy of `mutation` that also deletes every `predicates` edge of `uid`.
///
/// The caller still has to run it through [`Transaction::mutate`](crate::Transaction::mutate).
pub fn delete_edges<S: AsRef<str>>(mutation: &Mutation, uid: &str, predicates: &[S]) -> Mutation {
    let mut result = mutation.clone();
    result.del.extend(predicates.iter().map(|predicate| NQuad {
        subject: uid.to_string(),
        predicate: predicate.as_ref().to_string(),
        object_value: Some(Value {
            val: Some(value::Val::DefaultVal(STAR_ALL.to_string())),
        }),
        ..Default::default()
    }));
    result
}

/// Sets the JSON encoding of `value`.
pub fn set_json<T: Serialize + ?Sized>(value: &T) -> ClientResult<Mutation> {
    Ok(Mutation {
        set_json: serde_json::to_vec(value)?,
        ..Default::default()
    })
}

/// Deletes the JSON encoding of `value`.
pub fn delete_json<T: Serialize + ?Sized>(value: &T) -> ClientResult<Mutation> {
    Ok(Mutation {
        delete_json: serde_json::to_vec(value)?,
        ..Default::default()
    })
}

/// Sets RDF N-Quads.
pub fn set_nquads(rdf: impl Into<String>) -> Mutation {
    Mutation {
        set_nquads: rdf.into().into_bytes(),
        ..Default::default()
    }
}

/// Deletes RDF N-Quads.
pub fn del_nquads(rdf: impl Into<String>) -> Mutation {
    Mutation {
        del_nquads: rdf.into().into_bytes(),
        ..Default::default()
    }
}

/// Flags `mutation` to commit as soon as it is applied.
pub fn commit_now(mut mutation: Mutation) -> Mutation {
    mutation.commit_now = true;
    mutation
}
