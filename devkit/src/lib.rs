/*!
# Vitrine DevKit - Stubs des API amont pour les tests

Bibliothèque facilitant les tests du kernel avec:
- Serveur HTTP stub (GitHub, présence, images) sans réseau réel
- Enregistrement des requêtes reçues pour assertions
- Fixtures JSON conformes aux formats amont
*/

pub mod upstream_stub;
pub mod fixtures;

pub use upstream_stub::{RecordedRequest, StubResponse, StubUpstream};
pub use fixtures::Fixtures;
