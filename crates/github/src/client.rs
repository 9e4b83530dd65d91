//! GitHub API client.
//!
//! One [`GithubClient`] is built per run and shared across every remote
//! call. REST is used where a plain fetch suffices (PR/issue/user lookup,
//! comment creation); GraphQL is used for the ProjectV2 schema and all
//! board mutations. Query documents live next to the method that sends
//! them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::GithubError;
use crate::types::{FieldOption, FieldValue, Iteration, ProjectField, ProjectSchema};

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Envelope shared by every GraphQL response.
#[derive(Debug, Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

/// Typed GitHub client bound to a token and a pair of API endpoints.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    api_url: String,
    graphql_url: String,
}

impl GithubClient {
    /// Create a client for the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(token: &str) -> Result<Self, GithubError> {
        Self::with_endpoints(token, DEFAULT_API_URL, DEFAULT_GRAPHQL_URL)
    }

    /// Create a client with explicit REST and GraphQL endpoints.
    ///
    /// Endpoint overrides serve GitHub Enterprise installs and tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn with_endpoints(
        token: &str,
        api_url: &str,
        graphql_url: &str,
    ) -> Result<Self, GithubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GithubError::InvalidToken)?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("board-sync"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            graphql_url: graphql_url.to_string(),
        })
    }

    /// Send a GraphQL request and unwrap the response envelope.
    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: Value,
    ) -> Result<T, GithubError> {
        let response = self
            .client
            .post(&self.graphql_url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GithubError::Api { status, body });
        }

        let envelope: GraphqlEnvelope<T> = response.json().await?;
        if !envelope.errors.is_empty() {
            let message = envelope
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GithubError::Graphql { message });
        }

        envelope.data.ok_or(GithubError::MissingData {
            what: "GraphQL response data",
        })
    }

    /// GET a REST resource under the API base URL.
    async fn rest_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GithubError> {
        let url = format!("{}/{path}", self.api_url);
        debug!(url = %url, "GitHub REST GET");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GithubError::Api { status, body });
        }

        Ok(response.json().await?)
    }

    /// Fetch the project's node id and full field/option schema.
    ///
    /// # Errors
    ///
    /// Fails if the project, its node id, or its field list cannot be
    /// resolved — wrong project number or insufficient token scope.
    pub async fn project_schema(
        &self,
        owner: &str,
        project_number: u64,
    ) -> Result<ProjectSchema, GithubError> {
        const QUERY: &str = r"
            query ProjectSchema($owner: String!, $number: Int!) {
                organization(login: $owner) {
                    projectV2(number: $number) {
                        id
                        fields(first: 50) {
                            nodes {
                                ... on ProjectV2FieldCommon {
                                    id
                                    name
                                }
                                ... on ProjectV2SingleSelectField {
                                    options {
                                        id
                                        name
                                    }
                                }
                                ... on ProjectV2IterationField {
                                    configuration {
                                        iterations {
                                            id
                                            startDate
                                            duration
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        ";

        #[derive(Deserialize)]
        struct Data {
            organization: Option<Organization>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Organization {
            project_v2: Option<ProjectNode>,
        }

        #[derive(Deserialize)]
        struct ProjectNode {
            id: Option<String>,
            fields: Option<FieldConnection>,
        }

        #[derive(Deserialize)]
        struct FieldConnection {
            nodes: Option<Vec<Option<FieldNode>>>,
        }

        #[derive(Deserialize)]
        struct FieldNode {
            id: Option<String>,
            name: Option<String>,
            #[serde(default)]
            options: Vec<FieldOption>,
            configuration: Option<IterationConfiguration>,
        }

        #[derive(Deserialize)]
        struct IterationConfiguration {
            #[serde(default)]
            iterations: Vec<Iteration>,
        }

        let data: Data = self
            .graphql(QUERY, json!({ "owner": owner, "number": project_number }))
            .await?;

        let project = data
            .organization
            .ok_or(GithubError::MissingData { what: "organization" })?
            .project_v2
            .ok_or(GithubError::MissingData { what: "project" })?;

        let project_id = project.id.ok_or(GithubError::MissingData {
            what: "project node id",
        })?;
        let nodes = project
            .fields
            .and_then(|f| f.nodes)
            .ok_or(GithubError::MissingData {
                what: "project field list",
            })?;

        // Field kinds without a settable value come back as empty nodes.
        let fields = nodes
            .into_iter()
            .flatten()
            .filter_map(|node| {
                Some(ProjectField {
                    id: node.id?,
                    name: node.name?,
                    options: node.options,
                    iterations: node
                        .configuration
                        .map(|c| c.iterations)
                        .unwrap_or_default(),
                })
            })
            .collect::<Vec<_>>();

        debug!(
            project_id = %project_id,
            field_count = fields.len(),
            "Fetched project schema"
        );

        Ok(ProjectSchema { project_id, fields })
    }

    /// Node id of a pull request, by number.
    pub async fn pull_request_node_id(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<String, GithubError> {
        #[derive(Deserialize)]
        struct PullRequest {
            node_id: String,
        }

        let pr: PullRequest = self
            .rest_get(&format!("repos/{owner}/{repo}/pulls/{number}"))
            .await?;
        Ok(pr.node_id)
    }

    /// Node id of an issue, by number.
    pub async fn issue_node_id(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<String, GithubError> {
        #[derive(Deserialize)]
        struct Issue {
            node_id: String,
        }

        let issue: Issue = self
            .rest_get(&format!("repos/{owner}/{repo}/issues/{number}"))
            .await?;
        Ok(issue.node_id)
    }

    /// Assignable node id of a user, by login.
    pub async fn user_node_id(&self, login: &str) -> Result<String, GithubError> {
        #[derive(Deserialize)]
        struct User {
            node_id: String,
        }

        let user: User = self.rest_get(&format!("users/{login}")).await?;
        Ok(user.node_id)
    }

    /// Attach a PR/issue to the project and return the new project-item id.
    pub async fn add_item_to_project(
        &self,
        project_id: &str,
        content_id: &str,
    ) -> Result<String, GithubError> {
        const MUTATION: &str = r"
            mutation AddItemToProject($project: ID!, $id: ID!) {
                addProjectV2ItemById(input: {projectId: $project, contentId: $id}) {
                    item {
                        id
                    }
                }
            }
        ";

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            add_project_v2_item_by_id: Option<AddItem>,
        }

        #[derive(Deserialize)]
        struct AddItem {
            item: Option<Item>,
        }

        #[derive(Deserialize)]
        struct Item {
            id: String,
        }

        let data: Data = self
            .graphql(MUTATION, json!({ "project": project_id, "id": content_id }))
            .await?;

        data.add_project_v2_item_by_id
            .and_then(|a| a.item)
            .map(|item| item.id)
            .ok_or(GithubError::MissingData {
                what: "created project item id",
            })
    }

    /// Assign a user to a PR (or any assignable node).
    pub async fn add_assignee(
        &self,
        assignable_id: &str,
        assignee_id: &str,
    ) -> Result<(), GithubError> {
        const MUTATION: &str = r"
            mutation AssignUser($id: ID!, $assignee: ID!) {
                addAssigneesToAssignable(input: {assignableId: $id, assigneeIds: [$assignee]}) {
                    clientMutationId
                }
            }
        ";

        let _: Value = self
            .graphql(
                MUTATION,
                json!({ "id": assignable_id, "assignee": assignee_id }),
            )
            .await?;
        Ok(())
    }

    /// Authored timestamps of every commit on a PR, in API list order.
    pub async fn pull_request_commit_dates(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<DateTime<Utc>>, GithubError> {
        const QUERY: &str = r"
            query PullRequestCommits($owner: String!, $name: String!, $number: Int!) {
                repository(owner: $owner, name: $name) {
                    pullRequest(number: $number) {
                        commits(first: 250) {
                            nodes {
                                commit {
                                    authoredDate
                                }
                            }
                        }
                    }
                }
            }
        ";

        #[derive(Deserialize)]
        struct Data {
            repository: Option<Repository>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Repository {
            pull_request: Option<PullRequest>,
        }

        #[derive(Deserialize)]
        struct PullRequest {
            commits: Commits,
        }

        #[derive(Deserialize)]
        struct Commits {
            #[serde(default)]
            nodes: Vec<CommitNode>,
        }

        #[derive(Deserialize)]
        struct CommitNode {
            commit: Commit,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Commit {
            authored_date: DateTime<Utc>,
        }

        let data: Data = self
            .graphql(
                QUERY,
                json!({ "owner": owner, "name": repo, "number": number }),
            )
            .await?;

        let commits = data
            .repository
            .and_then(|r| r.pull_request)
            .ok_or(GithubError::MissingData {
                what: "pull request commit list",
            })?
            .commits
            .nodes;

        Ok(commits
            .into_iter()
            .map(|node| node.commit.authored_date)
            .collect())
    }

    /// Field-write shape for issues: status only.
    pub async fn update_issue_status(
        &self,
        project_id: &str,
        item_id: &str,
        status: &FieldValue,
    ) -> Result<(), GithubError> {
        const MUTATION: &str = r"
            mutation UpdateIssueStatus($project: ID!, $item: ID!, $statusField: ID!, $statusValue: String!) {
                status: updateProjectV2ItemFieldValue(
                    input: {projectId: $project, itemId: $item, fieldId: $statusField, value: {singleSelectOptionId: $statusValue}}
                ) {
                    projectV2Item {
                        id
                    }
                }
            }
        ";

        let _: Value = self
            .graphql(
                MUTATION,
                json!({
                    "project": project_id,
                    "item": item_id,
                    "statusField": status.field_id,
                    "statusValue": status.value_id,
                }),
            )
            .await?;
        Ok(())
    }

    /// Field-write shape for pull requests: status, milestones, and
    /// (optionally) effort in a single mutation.
    ///
    /// Absent milestone/effort pairs are passed as `false` include flags
    /// plus null ids; the document skips those updates, leaving the item's
    /// fields untouched.
    pub async fn update_pull_request_fields(
        &self,
        project_id: &str,
        item_id: &str,
        status: &FieldValue,
        monthly: Option<&FieldValue>,
        quarterly: Option<&FieldValue>,
        effort: Option<&FieldValue>,
    ) -> Result<(), GithubError> {
        // The three conditional field ids flow into `fieldId:`, a non-null
        // position. Static validation ignores @include, so each nullable
        // declaration must carry a default to be allowed there; the
        // defaults are never read because the skipped selections are
        // excluded at execution time.
        const MUTATION: &str = r#"
            mutation UpdatePullRequestFields(
                $project: ID!, $item: ID!,
                $statusField: ID!, $statusValue: String!,
                $monthlyIncluded: Boolean!, $monthlyField: ID = "0", $monthlyValue: String,
                $quarterlyIncluded: Boolean!, $quarterlyField: ID = "0", $quarterlyValue: String,
                $effortIncluded: Boolean!, $effortField: ID = "0", $effortValue: String
            ) {
                status: updateProjectV2ItemFieldValue(
                    input: {projectId: $project, itemId: $item, fieldId: $statusField, value: {singleSelectOptionId: $statusValue}}
                ) {
                    projectV2Item {
                        id
                    }
                }
                monthly: updateProjectV2ItemFieldValue(
                    input: {projectId: $project, itemId: $item, fieldId: $monthlyField, value: {iterationId: $monthlyValue}}
                ) @include(if: $monthlyIncluded) {
                    projectV2Item {
                        id
                    }
                }
                quarterly: updateProjectV2ItemFieldValue(
                    input: {projectId: $project, itemId: $item, fieldId: $quarterlyField, value: {iterationId: $quarterlyValue}}
                ) @include(if: $quarterlyIncluded) {
                    projectV2Item {
                        id
                    }
                }
                effort: updateProjectV2ItemFieldValue(
                    input: {projectId: $project, itemId: $item, fieldId: $effortField, value: {singleSelectOptionId: $effortValue}}
                ) @include(if: $effortIncluded) {
                    projectV2Item {
                        id
                    }
                }
            }
        "#;

        let _: Value = self
            .graphql(
                MUTATION,
                json!({
                    "project": project_id,
                    "item": item_id,
                    "statusField": status.field_id,
                    "statusValue": status.value_id,
                    "monthlyIncluded": monthly.is_some(),
                    "monthlyField": monthly.map(|m| m.field_id.clone()),
                    "monthlyValue": monthly.map(|m| m.value_id.clone()),
                    "quarterlyIncluded": quarterly.is_some(),
                    "quarterlyField": quarterly.map(|q| q.field_id.clone()),
                    "quarterlyValue": quarterly.map(|q| q.value_id.clone()),
                    "effortIncluded": effort.is_some(),
                    "effortField": effort.map(|e| e.field_id.clone()),
                    "effortValue": effort.map(|e| e.value_id.clone()),
                }),
            )
            .await?;
        Ok(())
    }

    /// Post a comment on a PR or issue.
    pub async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), GithubError> {
        let url = format!("{}/repos/{owner}/{repo}/issues/{number}/comments", self.api_url);
        debug!(url = %url, "GitHub REST POST comment");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "body": body }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GithubError::Api { status, body });
        }
        Ok(())
    }
}
