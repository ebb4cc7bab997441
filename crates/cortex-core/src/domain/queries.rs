//! Cypher used by ingestion, retrieval and pattern mining

// ========== Ingestion ==========

/// The message and both of its structural edges in one write.
/// An existing node keeps its properties and its edges follow them.
pub const MERGE_MESSAGE: &str = "\
MERGE (m:Message {id: $id})
ON CREATE SET m.from_agent = $from, m.channel = $channel, m.body = $body,
              m.timestamp = $timestamp, m.type = $kind
WITH m
MERGE (a:Agent {name: m.from_agent})
MERGE (a)-[:SENT]->(m)
MERGE (c:Channel {name: m.channel})
MERGE (m)-[:IN_CHANNEL]->(c)
RETURN m.id AS id, m.from_agent AS from_agent, m.channel AS channel";

pub const LINK_ENTITY: &str = "\
MATCH (m:Message {id: $messageId})
MATCH (e) WHERE e <> m AND (e.name = $entity OR e.path CONTAINS $entity OR e.id = $entity)
WITH m, e LIMIT 1
MERGE (m)-[:MENTIONS]->(e)
RETURN coalesce(e.name, e.path, e.id) AS linked";

pub const LINK_CONCEPT: &str = "\
MATCH (m:Message {id: $messageId})
MERGE (c:Concept {name: $concept})
ON CREATE SET c.created_at = $now, c.mention_count = 0
SET c.mention_count = coalesce(c.mention_count, 0) + 1
MERGE (m)-[:RELATES_TO]->(c)
RETURN c.name AS concept, c.mention_count AS mentions";

// ========== Retrieval ==========

pub const SEARCH_MESSAGES: &str = "\
MATCH (m:Message)
WHERE toLower(m.body) CONTAINS toLower($query)
OPTIONAL MATCH (a:Agent)-[:SENT]->(m)
RETURN m.id AS id, m.body AS body, coalesce(a.name, m.from_agent) AS from,
       m.channel AS channel, m.timestamp AS timestamp
ORDER BY m.timestamp DESC
LIMIT $limit";

pub const SEARCH_GRAPH: &str = "\
MATCH (n)
WHERE any(label IN labels(n) WHERE label IN $nodeTypes)
  AND (toLower(coalesce(n.name, '')) CONTAINS toLower($query)
    OR toLower(coalesce(n.description, '')) CONTAINS toLower($query)
    OR toLower(coalesce(n.path, '')) CONTAINS toLower($query))
OPTIONAL MATCH (n)-[r]-(related)
WITH n, collect(DISTINCT {type: type(r), target: coalesce(related.name, related.id)})[0..10] AS connections
RETURN n, labels(n) AS types, connections
LIMIT $limit";

pub const HISTORY_KEYWORDS: &[&str] = &["decision", "approved", "rejected", "selected", "chose"];

pub const DECISION_HISTORY: &str = "\
MATCH (m:Message)
WHERE any(keyword IN $keywords WHERE toLower(m.body) CONTAINS keyword)
  AND toLower(m.body) CONTAINS toLower($query)
OPTIONAL MATCH (a:Agent)-[:SENT]->(m)
RETURN m.id AS id, m.body AS body, coalesce(a.name, m.from_agent) AS agent, m.timestamp AS timestamp
ORDER BY m.timestamp DESC
LIMIT $limit";

// ========== Patterns ==========

pub const CONCEPT_COOCCURRENCE: &str = "\
MATCH (c1:Concept)<-[:RELATES_TO]-(m:Message)-[:RELATES_TO]->(c2:Concept)
WHERE c1.name < c2.name
WITH c1.name AS concept1, c2.name AS concept2, count(DISTINCT m) AS cooccurrences
WHERE cooccurrences >= 2
RETURN concept1, concept2, cooccurrences
ORDER BY cooccurrences DESC
LIMIT 10";

pub const AGENT_COLLABORATION: &str = "\
MATCH (a1:Agent)-[:SENT]->(m1:Message)-[:IN_CHANNEL]->(:Channel)<-[:IN_CHANNEL]-(m2:Message)<-[:SENT]-(a2:Agent)
WHERE a1.name < a2.name
  AND abs(datetime(m1.timestamp).epochSeconds - datetime(m2.timestamp).epochSeconds) < 1800
RETURN a1.name AS agent1, a2.name AS agent2, count(*) AS interactions
ORDER BY interactions DESC";

pub const DECISION_KEYWORDS: &[&str] = &["besluttet", "approved", "godkendt", "implement", "deploy", "fix"];

pub const DECISIONS: &str = "\
MATCH (a:Agent)-[:SENT]->(m:Message)
WHERE any(keyword IN $keywords WHERE toLower(m.body) CONTAINS keyword)
OPTIONAL MATCH (m)-[:MENTIONS]->(e)
RETURN m.body AS decision, a.name AS decided_by, m.timestamp AS decided_at,
       collect(DISTINCT coalesce(e.name, e.path, e.id)) AS affected
ORDER BY decided_at DESC
LIMIT 10";

// ========== Insights ==========

pub const HOTTEST_TOPICS: &str = "\
MATCH (c:Concept)
WHERE coalesce(c.mention_count, 0) > 0
RETURN c.name AS concept, c.mention_count AS mentions
ORDER BY mentions DESC, concept ASC
LIMIT 5";

pub const KNOWLEDGE_GAPS: &str = "\
MATCH (m:Message)-[:MENTIONS]->(e)
WHERE NOT e:Agent AND NOT (e)-[:DOCUMENTED_IN]->(:Document)
WITH e, count(DISTINCT m) AS mentions
WHERE mentions >= 2
RETURN coalesce(e.name, e.path, e.id) AS entity, mentions
ORDER BY mentions DESC
LIMIT 5";

pub const CROSS_CUTTING: &str = "\
MATCH (c:Concept)<-[:RELATES_TO]-(:Message)-[:IN_CHANNEL]->(ch:Channel)
WITH c, count(DISTINCT ch) AS channels
WHERE channels >= 2
RETURN c.name AS concept, channels
ORDER BY channels DESC
LIMIT 5";
