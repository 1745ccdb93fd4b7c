//! Form-template builder operations.

// self
use crate::{
	_prelude::*,
	gateway::Gateway,
	http::{ApiRequest, HttpTransport},
	services::{self, ValidationError},
};

const FORMS_PATH: &str = "employee/forms/";

/// Input types a template field may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
	/// Free text.
	Text,
	/// Numeric input.
	Number,
	/// Calendar date.
	Date,
	/// Masked input.
	Password,
	/// Email address.
	Email,
}
impl FieldType {
	/// Every field type, in the order the builder offers them.
	pub const ALL: [FieldType; 5] =
		[FieldType::Text, FieldType::Number, FieldType::Date, FieldType::Password, FieldType::Email];

	/// Wire value of the field type.
	pub const fn as_str(self) -> &'static str {
		match self {
			FieldType::Text => "text",
			FieldType::Number => "number",
			FieldType::Date => "date",
			FieldType::Password => "password",
			FieldType::Email => "email",
		}
	}
}
impl Display for FieldType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Field of a template that has not been created yet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormFieldDraft {
	/// Label shown next to the input.
	pub label: String,
	/// Input type.
	pub field_type: FieldType,
	/// Whether employees must fill the field in.
	pub required: bool,
	/// Display position; defaults to the field's index in the draft.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub order: Option<i64>,
	/// Free-form options for choice inputs.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub options: Option<serde_json::Value>,
}
impl FormFieldDraft {
	/// Creates an optional field without explicit order or options.
	pub fn new(label: impl Into<String>, field_type: FieldType) -> Self {
		Self { label: label.into(), field_type, required: false, order: None, options: None }
	}

	/// Marks the field as required.
	pub fn required(mut self) -> Self {
		self.required = true;

		self
	}
}

/// Template submitted to the form-template endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FormTemplateDraft {
	/// Template name.
	pub name: String,
	/// Optional description.
	pub description: String,
	/// Fields in display order.
	pub fields: Vec<FormFieldDraft>,
}
impl FormTemplateDraft {
	/// Creates an empty draft with the given name.
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), ..Default::default() }
	}

	/// Sets the description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();

		self
	}

	/// Appends a field.
	pub fn with_field(mut self, field: FormFieldDraft) -> Self {
		self.fields.push(field);

		self
	}

	/// Checks the draft and fills in missing field orders with the field index.
	pub fn normalized(mut self) -> Result<Self, ValidationError> {
		services::require("name", &self.name)?;

		if self.fields.is_empty() {
			return Err(ValidationError::NoFields);
		}

		for (index, field) in self.fields.iter_mut().enumerate() {
			if field.label.trim().is_empty() {
				return Err(ValidationError::MissingLabel { index });
			}

			field.order.get_or_insert(index as i64);
		}

		Ok(self)
	}
}

/// Field of a stored template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormField {
	/// Server-side identifier.
	pub id: u64,
	/// Label shown next to the input.
	pub label: String,
	/// Input type.
	pub field_type: FieldType,
	/// Whether employees must fill the field in.
	#[serde(default)]
	pub required: bool,
	/// Display position.
	#[serde(default)]
	pub order: i64,
	/// Free-form options for choice inputs.
	#[serde(default)]
	pub options: Option<serde_json::Value>,
}

/// Stored template with its fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
	/// Server-side identifier.
	pub id: u64,
	/// Template name.
	pub name: String,
	/// Description, empty when not set.
	#[serde(default)]
	pub description: String,
	/// Fields ordered by `order`.
	#[serde(default)]
	pub fields: Vec<FormField>,
	/// Creation time.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Last update time; absent in the creation response.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub updated_at: Option<OffsetDateTime>,
}

/// Entry of the template listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTemplateSummary {
	/// Server-side identifier.
	pub id: u64,
	/// Template name.
	pub name: String,
	/// Description, empty when not set.
	#[serde(default)]
	pub description: String,
	/// Number of fields in the template.
	#[serde(default)]
	pub fields_count: u32,
	/// Creation time.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

/// Template operations against the employee form endpoints.
pub struct FormService<T>
where
	T: ?Sized + HttpTransport,
{
	gateway: Gateway<T>,
}
impl<T> FormService<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a service that sends through `gateway`.
	pub fn new(gateway: Gateway<T>) -> Self {
		Self { gateway }
	}

	/// Validates and creates a template.
	pub async fn create(&self, draft: FormTemplateDraft) -> Result<FormTemplate> {
		services::observe("create_form", self.submit(draft)).await
	}

	/// Lists every template, newest first.
	pub async fn list(&self) -> Result<Vec<FormTemplateSummary>> {
		services::observe("list_forms", self.fetch(FORMS_PATH.to_owned())).await
	}

	/// Fetches one template with its fields.
	pub async fn get(&self, id: u64) -> Result<FormTemplate> {
		services::observe("get_form", self.fetch(format!("{FORMS_PATH}{id}/"))).await
	}

	async fn submit(&self, draft: FormTemplateDraft) -> Result<FormTemplate> {
		let draft = draft.normalized()?;
		let response = self.gateway.send(ApiRequest::post(FORMS_PATH).with_json(&draft)?).await?;

		Ok(response.json::<FormTemplate>()?)
	}

	async fn fetch<R>(&self, path: String) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		let response = self.gateway.send(ApiRequest::get(path)).await?;

		Ok(response.json::<R>()?)
	}
}
impl<T> Clone for FormService<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { gateway: self.gateway.clone() }
	}
}
impl<T> Debug for FormService<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FormService").field("gateway", &self.gateway).finish()
	}
}
